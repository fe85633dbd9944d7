use anyhow::Context;
use anyhow::Result;
#[cfg(test)]
use mockall::automock;

/// Opens URLs for the user.
#[cfg_attr(test, automock)]
pub trait Browser {
    fn open(&self, url: &str) -> Result<()>;
}

/// The platform's default browser.
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        open::that(url).with_context(|| format!("Failed to open URL {}", url))
    }
}
