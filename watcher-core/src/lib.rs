pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod gate;
pub mod notify;
pub mod page;
pub mod poller;
pub mod repair;
pub mod xml;

pub use config::{ConfigSource, EnvSource, FetcherKind, LiveSettings, WatcherConfig};
pub use error::{ConfigError, ParseError, WatchError};
pub use feed::{filter_by_category, Category, CategoryRule, FeedItem};
pub use fetch::{ChromeFetcher, HttpFetcher, PageFetcher, RequestHeaders};
pub use gate::{evaluate, Notification, SeenSet};
pub use notify::{Notifier, PushoverNotifier};
pub use poller::{spawn_watcher, CycleOutcome, RunState, Watcher, WatcherHandle};
pub use repair::repair;
