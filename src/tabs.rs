use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::domain::extract_domain;
use crate::messages::TabMessage;

pub type TabId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

/// Seam to the hosting browser: tab enumeration and one-way message
/// delivery to content scripts. Tests inject an in-memory fake.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// The active tab of the focused window, if any.
    async fn active_tab(&self) -> Option<TabInfo>;

    /// Every open tab, across all windows.
    async fn list_tabs(&self) -> Vec<TabInfo>;

    /// Deliver a message to one tab. May fail when the tab has no listener
    /// (closed, navigating); callers decide whether that matters.
    async fn send_message(&self, tab: TabId, message: &TabMessage) -> Result<()>;
}

/// Open tabs whose normalized URL domain equals `domain` exactly.
pub async fn tabs_for_domain(host: &dyn TabHost, domain: &str) -> Vec<TabInfo> {
    host.list_tabs()
        .await
        .into_iter()
        .filter(|tab| extract_domain(&tab.url).as_deref() == Some(domain))
        .collect()
}

/// Best-effort send. A tab without a listener is not an error condition;
/// the next resync event corrects its state.
pub async fn send_message_safe(host: &dyn TabHost, tab: TabId, message: &TabMessage) {
    if let Err(err) = host.send_message(tab, message).await {
        debug!("dropping message to tab {tab}: {err:#}");
    }
}

/// Best-effort broadcast to every open tab on `domain`.
pub async fn broadcast_to_domain(host: &dyn TabHost, domain: &str, message: &TabMessage) {
    for tab in tabs_for_domain(host, domain).await {
        send_message_safe(host, tab.id, message).await;
    }
}
