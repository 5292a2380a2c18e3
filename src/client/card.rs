use crate::client::dropdown::{Dropdown, Interaction};
use crate::provider::{Entry, Folder, UpstreamError};
use crate::tagset::TagSet;

/// Identifies one mount of a card. A reload mounts new cards, so answers
/// addressed to an older mount are recognised and dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MountId(pub(crate) u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagsPhase {
    Idle,
    Loading,
    /// Tags are known. `error` is set when fetching failed and the card
    /// started from no tags.
    Loaded { error: Option<String> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilesPhase {
    Idle,
    Loading,
    Loaded(Vec<Entry>),
    Failed { message: String, restricted: bool },
}

/// State of one folder on the page.
#[derive(Clone, Debug)]
pub struct FolderCard {
    folder: Folder,
    mount: MountId,
    mounted: bool,
    tags: TagSet,
    tags_phase: TagsPhase,
    files_phase: FilesPhase,
    input: String,
    dropdown: Dropdown,
}

impl FolderCard {
    pub fn new(folder: Folder, mount: MountId) -> FolderCard {
        FolderCard {
            folder,
            mount,
            mounted: true,
            tags: TagSet::new(),
            tags_phase: TagsPhase::Idle,
            files_phase: FilesPhase::Idle,
            input: String::new(),
            dropdown: Dropdown::default(),
        }
    }

    pub fn folder(&self) -> &Folder {
        &self.folder
    }

    pub fn id(&self) -> &str {
        &self.folder.id
    }

    pub fn mount(&self) -> MountId {
        self.mount
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn tags_phase(&self) -> &TagsPhase {
        &self.tags_phase
    }

    pub fn files_phase(&self) -> &FilesPhase {
        &self.files_phase
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn dropdown(&self) -> &Dropdown {
        &self.dropdown
    }

    pub fn dropdown_mut(&mut self) -> &mut Dropdown {
        &mut self.dropdown
    }

    pub fn unmount(&mut self) {
        self.mounted = false;
    }

    /// Whether an answer for `mount` may still change this card.
    fn accepts(&self, mount: MountId) -> bool {
        self.mounted && self.mount == mount
    }

    /// Tags are fetched once per mount.
    pub fn begin_tags(&mut self) -> bool {
        if self.mounted && self.tags_phase == TagsPhase::Idle {
            self.tags_phase = TagsPhase::Loading;
            true
        } else {
            false
        }
    }

    pub fn tags_loaded(&mut self, mount: MountId, tags: TagSet) -> bool {
        if !self.accepts(mount) || self.tags_phase != TagsPhase::Loading {
            return false;
        }
        self.tags = tags;
        self.tags_phase = TagsPhase::Loaded { error: None };
        true
    }

    pub fn tags_failed(&mut self, mount: MountId, message: String) -> bool {
        if !self.accepts(mount) || self.tags_phase != TagsPhase::Loading {
            return false;
        }
        self.tags = TagSet::new();
        self.tags_phase = TagsPhase::Loaded {
            error: Some(message),
        };
        true
    }

    pub fn begin_files(&mut self) -> bool {
        if self.mounted && self.files_phase == FilesPhase::Idle {
            self.files_phase = FilesPhase::Loading;
            true
        } else {
            false
        }
    }

    pub fn files_loaded(&mut self, mount: MountId, files: Vec<Entry>) -> bool {
        if !self.accepts(mount) || self.files_phase != FilesPhase::Loading {
            return false;
        }
        self.files_phase = FilesPhase::Loaded(files);
        true
    }

    pub fn files_failed(&mut self, mount: MountId, error: &UpstreamError) -> bool {
        if !self.accepts(mount) || self.files_phase != FilesPhase::Loading {
            return false;
        }
        self.files_phase = FilesPhase::Failed {
            message: error.to_string(),
            restricted: matches!(error, UpstreamError::RestrictedContent),
        };
        true
    }

    pub fn type_input(&mut self, text: &str) {
        self.input = text.to_string();
        self.dropdown.handle(Interaction::Typed);
    }

    /// Add `input` to the tags. On change the input is cleared, the
    /// dropdown closed and the new tags returned for saving.
    pub fn add_tag(&mut self, input: &str) -> Option<TagSet> {
        if !self.is_loaded() || !self.tags.add(input) {
            return None;
        }
        self.input.clear();
        self.dropdown.close();
        Some(self.tags.clone())
    }

    /// Remove the tag at `index`, returning the new tags for saving.
    pub fn remove_tag(&mut self, index: usize) -> Option<TagSet> {
        if !self.is_loaded() {
            return None;
        }
        self.tags.remove(index)?;
        Some(self.tags.clone())
    }

    fn is_loaded(&self) -> bool {
        self.mounted && matches!(self.tags_phase, TagsPhase::Loaded { .. })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::client::dropdown::Region;

    fn card() -> FolderCard {
        FolderCard::new(
            Folder {
                id: "id:1".to_string(),
                name: "Live".to_string(),
                path_hint: None,
                link: "https://example.com/s/Live?e=1&dl=0".to_string(),
            },
            MountId(1),
        )
    }

    #[test]
    fn tags_follow_idle_loading_loaded() {
        let mut card = card();
        assert_eq!(card.tags_phase(), &TagsPhase::Idle);
        assert!(!card.tags_loaded(MountId(1), TagSet::from_stored(["x"])));

        assert!(card.begin_tags());
        assert!(!card.begin_tags());
        assert!(card.tags_loaded(MountId(1), TagSet::from_stored(["rock"])));
        assert_eq!(card.tags_phase(), &TagsPhase::Loaded { error: None });
        assert_eq!(&**card.tags(), ["rock"]);
    }

    #[test]
    fn mutations_wait_for_loaded_tags() {
        let mut card = card();
        assert_eq!(card.add_tag("rock"), None);
        card.begin_tags();
        assert_eq!(card.add_tag("rock"), None);
        card.tags_loaded(MountId(1), TagSet::new());
        assert_eq!(card.add_tag("rock"), Some(TagSet::from_stored(["rock"])));
    }

    #[test]
    fn failed_fetch_starts_empty_with_inline_error() {
        let mut card = card();
        card.begin_tags();
        assert!(card.tags_failed(MountId(1), "Failed to fetch tags".to_string()));
        assert!(card.tags().is_empty());
        assert_eq!(
            card.tags_phase(),
            &TagsPhase::Loaded {
                error: Some("Failed to fetch tags".to_string())
            }
        );
        assert!(card.add_tag("jazz").is_some());
    }

    #[test]
    fn answers_after_unmount_are_ignored() {
        let mut card = card();
        card.begin_tags();
        card.begin_files();
        card.unmount();

        assert!(!card.tags_loaded(MountId(1), TagSet::from_stored(["late"])));
        assert!(!card.files_loaded(MountId(1), vec![]));
        assert!(card.tags().is_empty());
        assert_eq!(card.files_phase(), &FilesPhase::Loading);
    }

    #[test]
    fn answers_for_other_mount_are_ignored() {
        let mut card = card();
        card.begin_tags();
        assert!(!card.tags_loaded(MountId(7), TagSet::from_stored(["other"])));
        assert_eq!(card.tags_phase(), &TagsPhase::Loading);
    }

    #[test]
    fn restricted_listing_is_flagged() {
        let mut card = card();
        card.begin_files();
        card.files_failed(MountId(1), &UpstreamError::RestrictedContent);
        assert_eq!(
            card.files_phase(),
            &FilesPhase::Failed {
                message: "This folder contains restricted content.".to_string(),
                restricted: true,
            }
        );

        let mut other = self::card();
        other.begin_files();
        other.files_failed(MountId(1), &UpstreamError::Api("Bad Gateway".to_string()));
        assert!(matches!(
            other.files_phase(),
            FilesPhase::Failed {
                restricted: false,
                ..
            }
        ));
    }

    #[test]
    fn adding_clears_input_and_closes_dropdown() {
        let mut card = card();
        card.dropdown_mut().set_region(Region::new(0.0, 0.0, 50.0, 50.0));
        card.begin_tags();
        card.tags_loaded(MountId(1), TagSet::from_stored(["rock"]));

        card.type_input("  90s ");
        assert!(card.dropdown().is_open());

        assert_eq!(
            card.add_tag(&card.input().to_string()),
            Some(TagSet::from_stored(["rock", "90s"]))
        );
        assert_eq!(card.input(), "");
        assert!(!card.dropdown().is_open());

        card.type_input("rock");
        assert_eq!(card.add_tag("rock"), None);
        assert_eq!(card.input(), "rock");
    }

    #[test]
    fn remove_returns_remaining_tags() {
        let mut card = card();
        card.begin_tags();
        card.tags_loaded(MountId(1), TagSet::from_stored(["rock", "90s"]));
        assert_eq!(card.remove_tag(1), Some(TagSet::from_stored(["rock"])));
        assert_eq!(card.remove_tag(3), None);
    }
}
