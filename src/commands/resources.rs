use anyhow::Result;
use owo_colors::OwoColorize;

use fleetdesk_core::backend::Backend;
use fleetdesk_core::{NewResource, ResourceId, ResourceKind, ResourceStatus};

use crate::client::HttpBackend;
use crate::render::Render;
use crate::utils::tui::create_spinner;

pub async fn list(client: &HttpBackend) -> Result<()> {
    let spinner = create_spinner("Loading resources".into());
    let result = client.list_resources().await;
    spinner.finish_and_clear();

    let resources = result?;
    println!("{} ({})", "Resources".bold(), resources.len());
    if resources.is_empty() {
        println!("   {}", "None".dimmed());
    }
    for resource in &resources {
        println!("   {}", resource.render());
    }
    Ok(())
}

pub async fn add(
    client: &HttpBackend,
    label: String,
    kind: ResourceKind,
    quantity: Option<u32>,
) -> Result<()> {
    let resource = client
        .create_resource(NewResource {
            label,
            kind,
            quantity,
            image_url: None,
        })
        .await?;
    println!("Added {}", resource.render());
    Ok(())
}

/// Toggle maintenance. Turning it off makes the resource available again.
pub async fn maintenance(client: &HttpBackend, resource: &str, off: bool) -> Result<()> {
    let status = if off {
        ResourceStatus::Available
    } else {
        ResourceStatus::Maintenance
    };
    let resource = client
        .set_resource_status(&ResourceId::from(resource), status)
        .await?;
    println!("{}", resource.render());
    Ok(())
}
