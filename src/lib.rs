// src/lib.rs

#![doc = r#"
# livedocs

livedocs serves a static documentation directory over HTTP and reloads open
browser pages when files under it change.

## Modules

- [`config`]: Configuration loading and merging from CLI, file, and environment.
- [`watcher`]: Polling change detector over the documentation tree.
- [`signal`]: Shared reload flag, watermark, and event fan-out.
- [`event`]: Reload event struct and serialization.
- [`inject`]: Splicing the reload client into HTML.
- [`client`]: Browser-side reload scripts and endpoint paths.
- [`web`]: HTTP server, polling endpoints, and static file delegation.
- [`network`]: Local address discovery and port reclaim.
- [`browser`]: Opening the served page in a browser.
- [`error`]: Typed startup and scan errors.

See the README for usage examples and more details.
"#]

pub mod browser;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod inject;
pub mod network;
pub mod signal;
pub mod watcher;
pub mod web;
