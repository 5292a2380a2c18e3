//! In-process state of the folder browser.
//!
//! All changes go through [`Library`] methods. Local state is the source of
//! truth for what the user sees: tag edits apply immediately and come back
//! as [`SaveRequest`]s which the caller sends to the tag service without
//! waiting for the answer.

pub mod card;
pub mod dropdown;
pub mod filter;
pub mod session;

use std::collections::BTreeSet;

use crate::provider::{Entry, Folder, UpstreamError};
use crate::tagset::TagSet;
use card::{FolderCard, MountId};
use dropdown::Interaction;
use filter::{FilterSelection, PageLocation};

/// State of the page-level folder listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageStatus {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Complete tags of a folder that should be persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveRequest {
    pub folder_id: String,
    pub tags: Vec<String>,
}

#[derive(Debug)]
pub struct Library {
    cards: Vec<FolderCard>,
    vocabulary: Vec<String>,
    filter: FilterSelection,
    search: String,
    status: PageStatus,
    location: PageLocation,
    next_mount: u64,
}

impl Library {
    /// New library for the page at `location`; its query seeds the filter.
    pub fn new(location: PageLocation) -> Library {
        Library {
            cards: Vec::new(),
            vocabulary: Vec::new(),
            filter: location.selection(),
            search: String::new(),
            status: PageStatus::Idle,
            location,
            next_mount: 0,
        }
    }

    pub fn status(&self) -> &PageStatus {
        &self.status
    }

    pub fn cards(&self) -> &[FolderCard] {
        &self.cards
    }

    pub fn card(&self, folder_id: &str) -> Option<&FolderCard> {
        self.cards.iter().find(|c| c.id() == folder_id)
    }

    fn card_mut(&mut self, folder_id: &str) -> Option<&mut FolderCard> {
        self.cards.iter_mut().find(|c| c.id() == folder_id)
    }

    /// Sorted union of the tags of all cards.
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn filter(&self) -> &FilterSelection {
        &self.filter
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn location(&self) -> &PageLocation {
        &self.location
    }

    pub fn begin_load(&mut self) {
        self.status = PageStatus::Loading;
    }

    /// Replace all cards with fresh ones for `folders`. Previous cards are
    /// unmounted. Returns the new cards' ids and mounts.
    pub fn load_folders(&mut self, folders: Vec<Folder>) -> Vec<(String, MountId)> {
        self.unmount_all();

        self.cards = folders
            .into_iter()
            .map(|folder| {
                self.next_mount += 1;
                FolderCard::new(folder, MountId(self.next_mount))
            })
            .collect();
        self.status = PageStatus::Ready;
        self.refresh_vocabulary();

        self.cards
            .iter()
            .map(|c| (c.id().to_string(), c.mount()))
            .collect()
    }

    /// The folder listing failed. The page shows `message` and no folders.
    pub fn fail_load(&mut self, message: String) {
        self.unmount_all();
        self.cards.clear();
        self.status = PageStatus::Failed(message);
        self.refresh_vocabulary();
    }

    fn unmount_all(&mut self) {
        self.cards.iter_mut().for_each(FolderCard::unmount);
    }

    pub fn begin_tags(&mut self, folder_id: &str) -> bool {
        self.card_mut(folder_id)
            .map(FolderCard::begin_tags)
            .unwrap_or(false)
    }

    pub fn begin_files(&mut self, folder_id: &str) -> bool {
        self.card_mut(folder_id)
            .map(FolderCard::begin_files)
            .unwrap_or(false)
    }

    pub fn tags_loaded(&mut self, folder_id: &str, mount: MountId, tags: TagSet) {
        let applied = self
            .card_mut(folder_id)
            .map(|c| c.tags_loaded(mount, tags))
            .unwrap_or(false);
        if applied {
            self.refresh_vocabulary();
        } else {
            log::debug!("Ignoring late tags for {folder_id}.");
        }
    }

    pub fn tags_failed(&mut self, folder_id: &str, mount: MountId, message: String) {
        let applied = self
            .card_mut(folder_id)
            .map(|c| c.tags_failed(mount, message))
            .unwrap_or(false);
        if applied {
            self.refresh_vocabulary();
        } else {
            log::debug!("Ignoring late tag failure for {folder_id}.");
        }
    }

    pub fn files_loaded(&mut self, folder_id: &str, mount: MountId, files: Vec<Entry>) {
        let applied = self
            .card_mut(folder_id)
            .map(|c| c.files_loaded(mount, files))
            .unwrap_or(false);
        if !applied {
            log::debug!("Ignoring late files for {folder_id}.");
        }
    }

    pub fn files_failed(&mut self, folder_id: &str, mount: MountId, error: &UpstreamError) {
        let applied = self
            .card_mut(folder_id)
            .map(|c| c.files_failed(mount, error))
            .unwrap_or(false);
        if !applied {
            log::debug!("Ignoring late file failure for {folder_id}.");
        }
    }

    /// Add a tag typed (or picked from suggestions) on a folder's card.
    pub fn add_tag(&mut self, folder_id: &str, input: &str) -> Option<SaveRequest> {
        let tags = self.card_mut(folder_id)?.add_tag(input)?;
        Some(self.changed(folder_id, tags))
    }

    pub fn remove_tag(&mut self, folder_id: &str, index: usize) -> Option<SaveRequest> {
        let tags = self.card_mut(folder_id)?.remove_tag(index)?;
        Some(self.changed(folder_id, tags))
    }

    fn changed(&mut self, folder_id: &str, tags: TagSet) -> SaveRequest {
        self.refresh_vocabulary();
        SaveRequest {
            folder_id: folder_id.to_string(),
            tags: tags.into_vec(),
        }
    }

    pub fn type_input(&mut self, folder_id: &str, text: &str) {
        if let Some(card) = self.card_mut(folder_id) {
            card.type_input(text);
        }
    }

    /// Deliver a page interaction to every card's dropdown.
    pub fn interact(&mut self, interaction: Interaction) {
        for card in &mut self.cards {
            card.dropdown_mut().handle(interaction);
        }
    }

    /// Focus the tag input of one card.
    pub fn focus(&mut self, folder_id: &str) {
        if let Some(card) = self.card_mut(folder_id) {
            card.dropdown_mut().handle(Interaction::Focus);
        }
    }

    /// Suggestions to show under a card's tag input; empty while its
    /// dropdown is closed.
    pub fn suggestions(&self, folder_id: &str) -> Vec<String> {
        match self.card(folder_id) {
            Some(card) if card.dropdown().is_open() => {
                dropdown::suggestions(&self.vocabulary, card.tags(), card.input())
            }
            _ => Vec::new(),
        }
    }

    /// Select or deselect a filter tag. The page query is rewritten so the
    /// view can be shared; the new query is returned.
    pub fn toggle_filter(&mut self, tag: &str) -> &str {
        self.filter.toggle(tag);
        self.location.replace_query(&self.filter);
        self.location.query()
    }

    pub fn set_search(&mut self, text: &str) {
        self.search = text.to_string();
    }

    pub fn visible_folders(&self) -> impl Iterator<Item = &FolderCard> {
        self.cards
            .iter()
            .filter(move |c| self.filter.matches(&c.folder().name, c.tags(), &self.search))
    }

    fn refresh_vocabulary(&mut self) {
        self.vocabulary = self
            .cards
            .iter()
            .flat_map(|c| c.tags().iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
    }
}

impl Default for Library {
    fn default() -> Self {
        Library::new(PageLocation::default())
    }
}
