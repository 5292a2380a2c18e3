use std::collections::HashMap;

use futures::future::{FutureExt, LocalBoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use tokio::task::JoinHandle;

use crate::api::{ApiError, TagServiceClient};
use crate::client::card::MountId;
use crate::client::filter::PageLocation;
use crate::client::{Library, SaveRequest};
use crate::provider::{Entry, FolderProvider, UpstreamError};
use crate::tagset::TagSet;

/// Sends tag saves to the tag service in the background.
///
/// Nobody waits for a save: failures are logged and local state stays as
/// the user left it. With `serialize` on, saves of one folder are sent one
/// after another in the order they were made; otherwise each save races
/// the others and an older one may land last.
#[derive(Debug)]
pub struct SaveQueue {
    client: TagServiceClient,
    serialize: bool,
    /// Last save task of every folder with saves still in flight.
    tails: HashMap<String, JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SaveQueue {
    pub fn new(client: TagServiceClient, serialize: bool) -> SaveQueue {
        SaveQueue {
            client,
            serialize,
            tails: HashMap::new(),
            tasks: Vec::new(),
        }
    }

    pub fn dispatch(&mut self, request: SaveRequest) {
        self.tasks.retain(|t| !t.is_finished());
        self.tails.retain(|_, t| !t.is_finished());

        let client = self.client.clone();
        let SaveRequest { folder_id, tags } = request;

        if !self.serialize {
            self.tasks.push(tokio::spawn(async move {
                save(&client, &folder_id, &tags).await;
            }));
            return;
        }

        let previous = self.tails.remove(&folder_id);
        let task_folder = folder_id.clone();

        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    log::warn!("Earlier tag save of {task_folder} failed: {e}");
                }
            }
            save(&client, &task_folder, &tags).await;
        });
        self.tails.insert(folder_id, task);
    }

    /// Number of folders whose saves are still being sent.
    pub fn busy_folders(&self) -> usize {
        self.tails.values().filter(|t| !t.is_finished()).count()
    }

    /// Wait for every dispatched save to finish.
    pub async fn drain(mut self) {
        let tasks = self
            .tasks
            .drain(..)
            .chain(self.tails.drain().map(|(_, t)| t))
            .collect::<Vec<_>>();
        for task in tasks {
            if let Err(e) = task.await {
                log::warn!("Tag save task failed: {e}");
            }
        }
    }
}

async fn save(client: &TagServiceClient, folder_id: &str, tags: &[String]) {
    match client.set_tags(folder_id, tags).await {
        Ok(stored) => log::debug!("Saved {} tag(s) for {folder_id}.", stored.len()),
        Err(e) => log::warn!("Error saving tags for {folder_id}: {e}"),
    }
}

enum Fetched {
    Tags(String, MountId, Result<TagSet, ApiError>),
    Files(String, MountId, Result<Vec<Entry>, UpstreamError>),
}

/// Drives a [`Library`]: performs the network calls its state asks for
/// and feeds the answers back.
#[derive(Debug)]
pub struct Browser {
    library: Library,
    provider: FolderProvider,
    tags: TagServiceClient,
    saves: SaveQueue,
}

impl Browser {
    pub fn new(
        location: PageLocation,
        provider: FolderProvider,
        tags: TagServiceClient,
        serialize_saves: bool,
    ) -> Browser {
        Browser {
            library: Library::new(location),
            provider,
            saves: SaveQueue::new(tags.clone(), serialize_saves),
            tags,
        }
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut Library {
        &mut self.library
    }

    /// List folders, then fetch tags and files of every folder concurrently.
    /// A failed listing empties the page and is returned; failures of single
    /// folders stay on their cards.
    pub async fn load(&mut self, progress: &ProgressBar) -> Result<(), UpstreamError> {
        self.library.begin_load();

        let folders = match self.provider.list_folders().await {
            Ok(folders) => folders,
            Err(e) => {
                log::error!("Could not list folders: {e}");
                self.library.fail_load(e.to_string());
                return Err(e);
            }
        };
        log::info!("Listed {} folder(s).", folders.len());

        let mounts = self.library.load_folders(folders);

        let Browser {
            library,
            provider,
            tags,
            ..
        } = self;
        let (provider, tags) = (&*provider, &*tags);

        let mut pending: FuturesUnordered<LocalBoxFuture<'_, Fetched>> = FuturesUnordered::new();

        for (folder_id, mount) in mounts {
            if library.begin_tags(&folder_id) {
                let id = folder_id.clone();
                pending.push(
                    async move {
                        let result = tags.get_tags(&id).await;
                        Fetched::Tags(id, mount, result)
                    }
                    .boxed_local(),
                );
            }

            if library.begin_files(&folder_id) {
                let folder = library.card(&folder_id).map(|c| c.folder().clone());
                if let Some(folder) = folder {
                    pending.push(
                        async move {
                            let result = provider.list_files(&folder).await;
                            Fetched::Files(folder.id, mount, result)
                        }
                        .boxed_local(),
                    );
                }
            }
        }

        progress.set_length(pending.len() as u64);

        while let Some(fetched) = pending.next().await {
            match fetched {
                Fetched::Tags(id, mount, Ok(set)) => library.tags_loaded(&id, mount, set),
                Fetched::Tags(id, mount, Err(e)) => {
                    log::warn!("Error fetching tags for {id}: {e}");
                    library.tags_failed(&id, mount, e.to_string());
                }
                Fetched::Files(id, mount, Ok(files)) => library.files_loaded(&id, mount, files),
                Fetched::Files(id, mount, Err(e)) => {
                    log::warn!("Error listing files of {id}: {e}");
                    library.files_failed(&id, mount, &e);
                }
            }
            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok(())
    }

    /// Add a tag to a folder. The change is visible at once, saving happens
    /// in the background. Returns whether anything changed.
    pub fn add_tag(&mut self, folder_id: &str, input: &str) -> bool {
        match self.library.add_tag(folder_id, input) {
            Some(request) => {
                self.saves.dispatch(request);
                true
            }
            None => false,
        }
    }

    pub fn remove_tag(&mut self, folder_id: &str, index: usize) -> bool {
        match self.library.remove_tag(folder_id, index) {
            Some(request) => {
                self.saves.dispatch(request);
                true
            }
            None => false,
        }
    }

    /// Toggle a filter tag, returning the shareable location of the view.
    pub fn toggle_filter(&mut self, tag: &str) -> String {
        self.library.toggle_filter(tag);
        self.library.location().to_string()
    }

    /// Wait for outstanding saves and hand back the final state.
    pub async fn finish(self) -> Library {
        self.saves.drain().await;
        self.library
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use isahc::HttpClient;

    use super::*;

    fn request(folder_id: &str, tags: &[&str]) -> SaveRequest {
        SaveRequest {
            folder_id: folder_id.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    async fn settle(queue: &SaveQueue) {
        while queue.busy_folders() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn idle_folders_are_forgotten() {
        // Nothing listens there, every save fails quickly.
        let client = TagServiceClient::new(HttpClient::new().unwrap(), "http://127.0.0.1:9");
        let mut queue = SaveQueue::new(client, true);

        queue.dispatch(request("f1", &["rock"]));
        queue.dispatch(request("f1", &["rock", "90s"]));
        queue.dispatch(request("f2", &["jazz"]));
        assert_eq!(queue.tails.len(), 2);
        settle(&queue).await;

        queue.dispatch(request("f3", &["folk"]));
        assert_eq!(queue.tails.len(), 1);
        assert!(queue.tails.contains_key("f3"));

        queue.drain().await;
    }
}
