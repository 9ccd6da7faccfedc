use anyhow::Result;
use owo_colors::OwoColorize;

use fleetdesk_core::config::Preferences;

use crate::ConfigEdits;

pub fn run(prefs: &Preferences, edits: &ConfigEdits) -> Result<()> {
    let config_path = Preferences::config_path()?;

    if !edits.is_empty() {
        Preferences::update_file(&config_path, |stored| edits.apply(stored))?;
        println!("{} {}", "Saved".green(), config_path.display());
        return Ok(());
    }

    println!("{}", "Paths".bold());
    println!("  Config:     {}", config_path.display());
    println!("  Data:       {}", prefs.data_path().display());
    println!();
    println!("{}", "Preferences".bold());
    println!("  Server:     {}", prefs.server_url);
    println!("  Page size:  {}", prefs.page_size());
    println!("  Sound:      {}", if prefs.sound { "on" } else { "off" });

    Ok(())
}
