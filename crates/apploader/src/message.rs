use appkit::{Bundle, LaunchId};
use rtsync::ApiSignal;

use crate::error::LoaderResult;

/// A request to the loader thread. Blocking callers attach the signalling
/// half of a rendezvous; detached ones leave it empty.
pub(crate) enum LoaderMessage {
    AppStart {
        id: String,
        bundle: Bundle,
        reply: Option<ApiSignal<LoaderResult<LaunchId>>>,
    },
    AppStop {
        reply: Option<ApiSignal<LoaderResult<()>>>,
    },
    ServiceStop,
}

impl LoaderMessage {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            LoaderMessage::AppStart { .. } => "app start",
            LoaderMessage::AppStop { .. } => "app stop",
            LoaderMessage::ServiceStop => "service stop",
        }
    }
}
