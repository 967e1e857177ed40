pub mod announcement;
pub mod community_document;
pub mod document;
pub mod event;
pub mod gallery;
pub mod role;
pub mod user;
pub mod validate;

pub use announcement::{Announcement, AnnouncementUpdate, NewAnnouncement, Priority};
pub use community_document::{CommunityDocument, CommunityDocumentUpdate, NewCommunityDocument};
pub use document::{Collection, StoredDocument};
pub use event::{Event, EventUpdate, NewEvent};
pub use gallery::{GalleryImage, GalleryImageUpdate, NewGalleryImage};
pub use role::Role;
pub use user::{DirectoryEntry, NewUser, PrivacySettings, UserRecord, UserUpdate};
