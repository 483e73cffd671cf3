use crate::config::LabConfig;
use crate::device::InterfaceName;
use crate::routing::auto_generate_routes;
use crate::selector::PreferenceSelector;
use crate::topology::{ConnectOptions, ConnectOutcome, Topology};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::{info, warn};
use std::fs::File;
use std::path::Path;

/// Load and parse a lab file
pub fn load_config(config_path: &Path) -> Result<LabConfig> {
    info!("Loading lab from: {:?}", config_path);

    // Open the lab file
    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open lab file '{}'", config_path.display()))?;

    // Parse the YAML content
    let config: LabConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse lab file '{}'", config_path.display()))?;

    // Validate the configuration
    config.validate()?;

    info!(
        "Lab has {} devices, {} links and {} queries",
        config.devices.len(),
        config.links.len(),
        config.queries.len()
    );
    Ok(config)
}

fn parse_interface(name: &Option<String>) -> Result<Option<InterfaceName>> {
    name.as_deref()
        .map(|n| n.parse::<InterfaceName>().map_err(|e| eyre!(e)))
        .transpose()
}

/// Build the topology described by a lab file.
///
/// Devices are registered in file order, then links are made in file
/// order. Ambiguous router ports go to LAN, then LAN2, then WAN.
pub fn build_lab(config: &LabConfig) -> Result<Topology> {
    let mut topology = Topology::with_settings(config.topology_settings());

    for device_config in &config.devices {
        let device = device_config.to_device()?;
        topology
            .add_device(device)
            .wrap_err_with(|| format!("Failed to add device '{}'", device_config.id))?;
    }

    let mut selector = PreferenceSelector::default();
    for link in &config.links {
        let options = ConnectOptions::interfaces(parse_interface(&link.interface_a)?, parse_interface(&link.interface_b)?);
        let outcome = topology
            .create_connection(&link.a, &link.b, options, &mut selector)
            .wrap_err_with(|| format!("Failed to link '{}' and '{}'", link.a, link.b))?;

        if let ConnectOutcome::AlreadyConnected(id) = outcome {
            warn!("Duplicate link {} <-> {} ignored (already {})", link.a, link.b, id);
        }
    }

    if config.general.auto_routes {
        let routers: Vec<String> = topology
            .devices()
            .filter(|device| device.is_router())
            .map(|device| device.id().to_string())
            .collect();
        for router in routers {
            auto_generate_routes(&mut topology, &router)
                .wrap_err_with(|| format!("Failed to generate routes for '{}'", router))?;
        }
        // New routes can turn unreachable links into routed ones
        topology.refresh_connection_kinds();
    }

    info!(
        "Built lab topology: {} devices, {} connections",
        topology.device_count(),
        topology.connections().count()
    );
    Ok(topology)
}
