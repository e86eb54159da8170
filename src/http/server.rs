use anyhow::anyhow;
use log::{info, warn};
use rouille::{Request, Response, input::post::BufferedFile};
use serde::de::DeserializeOwned;
use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use crate::{
    auth::AuthProvider,
    catalog::{
        Catalog, CatalogCache,
        error::CatalogError,
        fs::{COVERS_PREFIX, MUSIC_PREFIX},
        upload::{UploadedFile, store_upload},
    },
    config::{HttpConfig, Library},
    domain::{
        hash::TrackId,
        view::{SortMode, view},
    },
    http::{
        api::{
            DurationRequest, ErrorReport, PlayCountResponse, ProfileResponse, SeekRequest,
            SessionResponse, TitleRequest, TrackResponse, VolumeRequest,
        },
        error::ApiError,
    },
    player::{Player, SharedCounts},
    storage::{error::StorageError, plays::PlayCountStore},
};

pub struct HttpServer {
    catalog: Arc<CatalogCache>,
    counts: SharedCounts,
    player: Mutex<Player>,
    auth: Box<dyn AuthProvider + Send + Sync>,
    library: Library,
    pub config: HttpConfig,
}

impl HttpServer {
    pub fn new(
        catalog: Arc<CatalogCache>,
        counts: SharedCounts,
        player: Player,
        auth: Box<dyn AuthProvider + Send + Sync>,
        library: Library,
        config: HttpConfig,
    ) -> Self {
        Self {
            catalog,
            counts,
            player: Mutex::new(player),
            auth,
            library,
            config,
        }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let response = rouille::router!(request,
            (GET) (/api/music) => {
                Self::respond(self.list_music(request))
            },
            (POST) (/api/music/reload) => {
                Self::respond(self.reload_music())
            },
            (POST) (/api/play) => {
                Self::respond(self.record_play(request))
            },
            (GET) (/api/top) => {
                Self::respond(self.top(request))
            },
            (GET) (/api/profile) => {
                Self::respond(self.profile(request))
            },
            (POST) (/api/logout) => {
                Self::respond(self.logout(request))
            },

            (GET) (/api/session) => {
                Self::respond(self.with_player(|player| Ok(Self::session_json(player))))
            },
            (POST) (/api/session/select) => {
                Self::respond(self.select(request))
            },
            (POST) (/api/session/toggle) => {
                Self::respond(self.with_player(|player| {
                    player.toggle_play_pause();
                    Ok(Self::session_json(player))
                }))
            },
            (POST) (/api/session/seek) => {
                Self::respond(self.seek(request))
            },
            (POST) (/api/session/volume) => {
                Self::respond(self.volume(request))
            },
            (POST) (/api/session/duration) => {
                Self::respond(self.duration(request))
            },
            (POST) (/api/session/loop) => {
                Self::respond(self.with_player(|player| {
                    player.toggle_loop();
                    Ok(Self::session_json(player))
                }))
            },
            (POST) (/api/session/shuffle) => {
                Self::respond(self.with_player(|player| {
                    player.toggle_shuffle();
                    Ok(Self::session_json(player))
                }))
            },
            (POST) (/api/session/ended) => {
                Self::respond(self.with_player(|player| {
                    player.ended()?;
                    Ok(Self::session_json(player))
                }))
            },
            (POST) (/api/session/error) => {
                Self::respond(self.report_error(request))
            },

            (GET) (/tracks/{id: String}/stream) => {
                Self::respond(self.get_track_stream(&id))
            },
            (POST) (/upload) => {
                Self::respond(self.upload(request))
            },
            _ => self.serve_static(request)
        );

        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    fn respond(result: Result<Response, ApiError>) -> Response {
        result.unwrap_or_else(ApiError::into_response)
    }

    fn json_body<T: DeserializeOwned>(request: &Request) -> Result<T, ApiError> {
        rouille::input::json_input(request)
            .map_err(|e| ApiError::BadRequest(format!("invalid json body: {e}")))
    }

    fn with_counts<T, F>(&self, action: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut (dyn PlayCountStore + Send + 'static)) -> Result<T, StorageError>,
    {
        let mut counts = self.counts.lock().map_err(|e| {
            StorageError::Internal(anyhow!("Could not access play counts under lock: {e}"))
        })?;
        Ok(action(&mut *counts)?)
    }

    fn with_player<F>(&self, action: F) -> Result<Response, ApiError>
    where
        F: FnOnce(&mut Player) -> Result<Response, ApiError>,
    {
        let mut player = self.player.lock().map_err(|e| {
            ApiError::from(StorageError::Internal(anyhow!(
                "Could not access playback session under lock: {e}"
            )))
        })?;
        action(&mut player)
    }

    fn session_json(player: &Player) -> Response {
        Response::json(&SessionResponse::from_domain(player.session(), player.plays()))
    }

    /// Catalog as of the last successful load, loading it if that never happened.
    fn current_catalog(&self) -> Result<Catalog, CatalogError> {
        let current = self.catalog.current();
        if current.generation() > 0 {
            return Ok(current);
        }
        self.catalog.load()
    }

    fn list_music(&self, request: &Request) -> Result<Response, ApiError> {
        let filter = request.get_param("filter").unwrap_or_default();
        let sort = request
            .get_param("sort")
            .map(|s| s.parse::<SortMode>())
            .transpose()
            .map_err(ApiError::BadRequest)?
            .unwrap_or_default();

        let catalog = self.current_catalog()?;
        let tracks = view(catalog.tracks(), &filter, sort)
            .into_iter()
            .map(TrackResponse::from_domain)
            .collect::<Vec<_>>();

        Ok(Response::json(&tracks))
    }

    fn reload_music(&self) -> Result<Response, ApiError> {
        let catalog = self.catalog.load()?;
        Ok(Response::json(&serde_json::json!({
            "tracks": catalog.len(),
            "generation": catalog.generation(),
        })))
    }

    fn record_play(&self, request: &Request) -> Result<Response, ApiError> {
        let body: TitleRequest = Self::json_body(request)?;
        let title = body.title.trim();
        if title.is_empty() {
            return Err(ApiError::BadRequest("missing title".into()));
        }

        let plays = self.with_counts(|counts| counts.increment(title))?;
        info!("play: {title} ({plays})");

        Ok(Response::json(&PlayCountResponse {
            title: title.to_string(),
            plays,
        }))
    }

    fn top(&self, request: &Request) -> Result<Response, ApiError> {
        let n = match request.get_param("n") {
            Some(n) => n
                .parse::<usize>()
                .map_err(|_| ApiError::BadRequest(format!("invalid ranking size '{n}'")))?,
            None => self.config.top_n,
        };

        let top = self
            .with_counts(|counts| counts.top(n))?
            .into_iter()
            .map(PlayCountResponse::from)
            .collect::<Vec<_>>();

        Ok(Response::json(&top))
    }

    fn profile(&self, request: &Request) -> Result<Response, ApiError> {
        let user = self.auth.current_user(request)?;
        Ok(Response::json(&ProfileResponse {
            username: user.username,
        }))
    }

    fn logout(&self, request: &Request) -> Result<Response, ApiError> {
        self.auth.logout(request)?;
        Ok(Response::empty_204())
    }

    fn select(&self, request: &Request) -> Result<Response, ApiError> {
        let body: TitleRequest = Self::json_body(request)?;
        self.with_player(|player| {
            player.select(&body.title)?;
            Ok(Self::session_json(player))
        })
    }

    fn seek(&self, request: &Request) -> Result<Response, ApiError> {
        let body: SeekRequest = Self::json_body(request)?;
        self.with_player(|player| {
            player.seek(body.position)?;
            Ok(Self::session_json(player))
        })
    }

    fn volume(&self, request: &Request) -> Result<Response, ApiError> {
        let body: VolumeRequest = Self::json_body(request)?;
        self.with_player(|player| {
            player.set_volume(body.volume);
            Ok(Self::session_json(player))
        })
    }

    fn duration(&self, request: &Request) -> Result<Response, ApiError> {
        let body: DurationRequest = Self::json_body(request)?;
        self.with_player(|player| {
            player.set_duration(body.seconds)?;
            Ok(Self::session_json(player))
        })
    }

    fn report_error(&self, request: &Request) -> Result<Response, ApiError> {
        let body: ErrorReport = Self::json_body(request)?;
        self.with_player(|player| {
            player.report_error(&body.reason);
            Ok(Self::session_json(player))
        })
    }

    /// returns Response with ok status, or ApiError
    fn get_track_stream(&self, id: &str) -> Result<Response, ApiError> {
        let track_id =
            TrackId::from_hex(id).map_err(|_| ApiError::BadRequest("invalid track id".into()))?;

        let catalog = self.current_catalog()?;
        let track = catalog
            .find_by_id(&track_id)
            .ok_or_else(|| ApiError::NotFound(format!("track {track_id} not found")))?;

        let path = self.catalog.locate(&track.file_ref)?;
        let mime = Self::mime_for_track(&path);

        let file = std::fs::File::open(&path).map_err(CatalogError::Io)?;
        log::debug!(
            "STREAM {} -> 200 OK, path: {}, MIME type: {}",
            id,
            path.to_string_lossy(),
            mime
        );

        Ok(Response::from_file(mime, file)
            .with_additional_header("X-Track-Title", track.title.clone()))
    }

    fn mime_for_track(path: &Path) -> String {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy())
            .map(|s| s.to_lowercase());
        let default = || {
            mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string()
        };
        ext.and_then(|ext| Self::mime_from_ext(ext.as_str()))
            .unwrap_or_else(default)
    }

    /// Map file extension (without dot) to proper MIME type for browser playback.
    /// Returns None if the extension is not recognized.
    pub fn mime_from_ext(ext: &str) -> Option<String> {
        match ext {
            "m4a" => Some("audio/x-m4a".to_string()), // Safari iOS compatible
            "aac" => Some("audio/aac".to_string()),
            "mp3" => Some("audio/mpeg".to_string()),
            "wav" => Some("audio/wav".to_string()),
            "ogg" => Some("audio/ogg".to_string()),
            "flac" => Some("audio/flac".to_string()),
            _ => None,
        }
    }

    /// multipart form with `title`, `file` and `cover`
    fn upload(&self, request: &Request) -> Result<Response, ApiError> {
        let input = rouille::post_input!(request, {
            title: String,
            file: BufferedFile,
            cover: BufferedFile,
        })
        .map_err(|e| ApiError::BadRequest(format!("missing data: {e}")))?;

        let stored = store_upload(
            &self.library,
            &input.title,
            UploadedFile {
                file_name: input.file.filename.as_deref(),
                data: &input.file.data,
            },
            UploadedFile {
                file_name: input.cover.filename.as_deref(),
                data: &input.cover.data,
            },
        )?;

        if let Err(err) = self.catalog.load() {
            warn!("track stored but catalog reload failed: {err}");
        }

        Ok(Response::text(format!("track '{}' uploaded", stored.title)))
    }

    /// `/{dir}/rest` as `/rest`, None for urls like `/{dir}al.html`
    fn under_dir(request: &Request, dir: &str) -> Option<Request> {
        if !request.url().starts_with(&format!("/{dir}/")) {
            return None;
        }
        request.remove_prefix(&format!("/{dir}"))
    }

    fn serve_static(&self, request: &Request) -> Response {
        if let Some(request) = Self::under_dir(request, MUSIC_PREFIX) {
            return rouille::match_assets(&request, &self.library.music_dir);
        }
        if let Some(request) = Self::under_dir(request, COVERS_PREFIX) {
            return rouille::match_assets(&request, &self.library.covers_dir);
        }

        if request.method() == "GET" && request.url() == "/" {
            let index = self.library.public_dir.join("index.html");
            return match std::fs::File::open(index) {
                Ok(file) => Response::from_file("text/html; charset=utf-8", file),
                Err(_) => Response::empty_404(),
            };
        }

        rouille::match_assets(request, &self.library.public_dir)
    }
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}
