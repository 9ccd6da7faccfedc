use anyhow::Result;

use fleetdesk_core::availability::{ReadFailurePolicy, Verdict};
use fleetdesk_core::{BookingId, ResourceId, WindowArgs};

use crate::client::HttpBackend;
use crate::render::Render;

/// Ask the server whether `resource` is free for a window.
pub async fn run(
    client: &HttpBackend,
    resource: &str,
    window: WindowArgs,
    exclude: Option<String>,
) -> Result<()> {
    let window = window.parse()?;
    let exclude = exclude.map(BookingId::new);

    let verdict = match client
        .availability(&ResourceId::from(resource), &window, exclude.as_ref())
        .await
    {
        Ok(verdict) => verdict,
        Err(e) if e.kind() == fleetdesk_core::ErrorKind::Transient => {
            tracing::warn!(error = %e, "availability check failed");
            Verdict::Unverified {
                error: e.to_string(),
                policy: ReadFailurePolicy::FailOpenFlagged,
            }
        }
        Err(e) => return Err(e.into()),
    };

    println!("{} {} {}", resource, window, verdict.render());
    Ok(())
}
