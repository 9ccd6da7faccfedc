use anyhow::Result;
use owo_colors::OwoColorize;

use fleetdesk_core::history::HistoryFilter;

use crate::client::HttpBackend;
use crate::render::render_page;
use crate::utils::tui::create_spinner;

pub async fn run(
    client: &HttpBackend,
    filter: HistoryFilter,
    page: usize,
    page_size: usize,
) -> Result<()> {
    let spinner = create_spinner("Loading history".into());
    let result = client.history(filter, page, page_size).await;
    spinner.finish_and_clear();

    println!("{} {}", "History".bold(), format!("({})", filter).dimmed());
    println!("{}", render_page(&result?));
    Ok(())
}
