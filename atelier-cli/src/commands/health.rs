//! Health command handler

use anyhow::Result;
use atelier_client::AtelierClient;
use colored::*;

/// Show service banner, queue state and device layout
pub async fn health(client: &AtelierClient) -> Result<()> {
    let info = client.service_info().await?;
    let health = client.health().await?;

    println!("{} {}", info.message.bold(), format!("v{}", info.version).dimmed());
    println!("  Status:         {}", health.status.green());
    println!(
        "  Pipeline ready: {}",
        if health.pipeline_ready {
            "✓".green()
        } else {
            "✗".red()
        }
    );
    println!("  Queue length:   {}", health.queue_length);
    println!("  Active tasks:   {}", health.active_tasks);
    println!("  Total tasks:    {}", health.total_tasks);

    if let Some(device) = health.device {
        println!("\n{}", "Device:".bold());
        println!("  Type:     {}", device.device_type.cyan());
        println!("  Count:    {}", device.device_count);
        println!("  Topology: tp={} ep={}", device.tp_size, device.ep_size);
        if !device.visible_devices.is_empty() {
            println!("  Visible:  {}", device.visible_devices);
        }
        println!("  Project:  {}", device.project_path.dimmed());
    }

    Ok(())
}
