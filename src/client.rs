// src/client.rs
//! Browser-side reload clients, one per [`ReloadMode`].

use crate::config::ReloadMode;
use std::time::Duration;

pub const FLAG_PATH: &str = "/__live_reload_check__";
pub const WATERMARK_PATH: &str = "/_check_reload";
pub const EVENTS_PATH: &str = "/__live_reload_events__";

/// A rendered `<script>` block, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientScript(String);

impl ClientScript {
    /// Renders the client for `mode`, polling every `interval` where it polls.
    pub fn new(mode: ReloadMode, interval: Duration) -> Self {
        let interval_ms = interval.as_millis().max(1);
        let body = match mode {
            ReloadMode::Flag => format!(
                r#"(function() {{
    setInterval(async () => {{
        try {{
            const response = await fetch('{FLAG_PATH}', {{ cache: 'no-store' }});
            const data = await response.json();
            if (data.reload) {{
                console.log('[livedocs] Reloading page...');
                location.reload();
            }}
        }} catch (e) {{
            // Server might be restarting.
        }}
    }}, {interval_ms});
}})();"#
            ),
            ReloadMode::Watermark => format!(
                r#"(function() {{
    let lastModified = null;
    async function checkForChanges() {{
        try {{
            const response = await fetch('{WATERMARK_PATH}', {{ cache: 'no-store' }});
            const data = await response.json();
            if (lastModified !== null && data.modified !== lastModified) {{
                console.log('[livedocs] Changes detected, reloading...');
                window.location.reload();
                return;
            }}
            lastModified = data.modified;
        }} catch (e) {{
            // Server might be restarting.
        }}
    }}
    setInterval(checkForChanges, {interval_ms});
    window.addEventListener('focus', checkForChanges);
}})();"#
            ),
            ReloadMode::Events => format!(
                r#"(function() {{
    let reloading = false;
    const source = new EventSource('{EVENTS_PATH}');
    source.addEventListener('reload', () => {{
        if (reloading) return;
        reloading = true;
        source.close();
        console.log('[livedocs] Reloading page...');
        location.reload();
    }});
    // EventSource reconnects on its own after network errors.
}})();"#
            ),
        };
        ClientScript(format!("\n<script>\n{body}\n</script>\n"))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for ClientScript {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_client_treats_zero_as_seen() {
        let script = ClientScript::new(ReloadMode::Watermark, Duration::from_millis(500));
        assert!(script.as_ref().contains("lastModified !== null"));
        assert!(!script.as_ref().contains("if (lastModified &&"));
        assert!(script.as_ref().contains(WATERMARK_PATH));
    }

    #[test]
    fn test_scripts_are_wrapped_in_script_tags() {
        for mode in [ReloadMode::Flag, ReloadMode::Watermark, ReloadMode::Events] {
            let script = ClientScript::new(mode, Duration::from_millis(250));
            assert!(script.as_ref().starts_with("\n<script>\n"));
            assert!(script.as_ref().ends_with("\n</script>\n"));
        }
    }
}
