//! A front-end page reconstructed from its URL.
//!
//! There is no browser behind the CLI: the "playing" video is whatever the
//! URL names, and opening a video prints the URL it would navigate to.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use url::Url;
use vidsync_core::{VidsyncError, VidsyncResult};
use vidsync_stack::{
    ListenMode, LocationController, PlayerController, PlaylistVideoInfo, StackItem, UrlExtractor,
    VideoInfo,
};

pub struct UrlPage {
    front_end: Url,
    url: Option<Url>,
    item: Option<StackItem>,
    opened: Mutex<Vec<Url>>,
}

impl UrlPage {
    /// No page open; only used to open videos on `front_end`.
    pub fn blank(front_end: Url) -> Self {
        Self {
            front_end,
            url: None,
            item: None,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// The page at `url`, playing the video it names.
    pub fn visit(
        urls: &Arc<dyn UrlExtractor>,
        url: Url,
        title: Option<String>,
        time: Option<f64>,
    ) -> Self {
        let item = urls.video_id(&url).map(|id| {
            let video = VideoInfo {
                title: title.unwrap_or_else(|| id.clone()),
                time_current: time.or_else(|| urls.video_start_time(&url)),
                listen_mode: urls.is_listen_mode(&url),
                ..VideoInfo::new(id)
            };
            match (urls.playlist_id(&url), urls.playlist_index(&url)) {
                (Some(playlist_id), Some(playlist_idx)) => StackItem::from(PlaylistVideoInfo {
                    video,
                    playlist_id,
                    playlist_idx,
                }),
                _ => StackItem::from(video),
            }
        });

        let mut front_end = url.clone();
        front_end.set_path("/");
        front_end.set_query(None);

        Self {
            front_end,
            url: Some(url),
            item,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Navigation targets requested so far.
    #[cfg(test)]
    pub fn opened(&self) -> Vec<Url> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn open(
        &self,
        params: &[(&str, String)],
        time: Option<f64>,
        mode: ListenMode,
    ) -> VidsyncResult<bool> {
        if let Some((name, _)) = params.iter().find(|(_, value)| value.is_empty()) {
            return Err(VidsyncError::Controller(format!(
                "cannot open a page with an empty `{name}`"
            )));
        }

        let mut target = self.front_end.clone();
        target.set_path("/watch");
        {
            let mut query = target.query_pairs_mut();
            query.clear();
            for (name, value) in params {
                query.append_pair(name, value);
            }
            if let Some(time) = time {
                query.append_pair("t", &format!("{}", time.floor() as i64));
            }
            match mode {
                ListenMode::Audio => {
                    query.append_pair("listen", "1");
                }
                ListenMode::Video => {
                    query.append_pair("listen", "0");
                }
                ListenMode::Keep => {}
            }
        }

        let reload = self.url.as_ref() != Some(&target);
        println!("open {target}");
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target);
        Ok(reload)
    }
}

impl LocationController for UrlPage {
    fn current_url(&self) -> Option<Url> {
        self.url.clone()
    }
}

#[async_trait]
impl PlayerController for UrlPage {
    fn current_video_item(&self) -> Option<StackItem> {
        self.item.clone()
    }

    fn time_current(&self) -> Option<f64> {
        self.item.as_ref().and_then(|i| i.video().time_current)
    }

    fn time_total(&self) -> Option<f64> {
        self.item.as_ref().and_then(|i| i.video().time_total)
    }

    fn prev_playlist_link(&self) -> Option<Url> {
        None
    }

    async fn open_video(&self, id: &str, time: Option<f64>, mode: ListenMode) -> VidsyncResult<bool> {
        self.open(&[("v", id.to_string())], time, mode)
    }

    async fn open_playlist(
        &self,
        playlist_id: &str,
        idx: u32,
        video_id: &str,
        time: Option<f64>,
        mode: ListenMode,
    ) -> VidsyncResult<bool> {
        self.open(
            &[
                ("v", video_id.to_string()),
                ("list", playlist_id.to_string()),
                ("index", idx.to_string()),
            ],
            time,
            mode,
        )
    }
}
