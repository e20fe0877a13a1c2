mod content;
mod session;
mod timestamp;

pub use content::{ContentDescriptor, ContentKind, MediaType, VideoIdentity};
pub use session::{SkipPreferences, TabId, TabSkipSession};
pub use timestamp::{PendingSkip, SkipCategory, SkipStatus, SkipTimestamp, VoteDirection};
