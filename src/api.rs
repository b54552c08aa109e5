// Session client for the SheepIt renderfarm website. There is no documented
// API: the client replays the form posts a browser would make, over one
// cookie-bearing session, and scrapes the answers out of the returned pages
// (see the `scrape` module).
//
// Every operation is a blocking request/response exchange with a short fixed
// timeout and no retries. A caller that wants retries or parallel uploads
// runs them itself, with one client instance per thread.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{COOKIE, SET_COOKIE};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::job::{FrameSplit, JobOptions, RenderFrames};
use crate::scrape::{self, Profile};
use crate::session::CookieJar;

/// Every call except the upload body itself gives up after this long.
const TIMEOUT: Duration = Duration::from_secs(5);

/// Blender build the farm runs; sent with every job submission.
const EXECUTABLE: &str = "blender291.0";

/// Where a new account can be created. The client never opens this itself;
/// the UI shows it to the user.
pub const REGISTER_URL: &str = "https://www.sheepit-renderfarm.com/account.php?mode=register";

/// One authenticated (or not yet authenticated) session against the farm.
///
/// Methods take `&mut self` because every exchange may update the cookie
/// jar in place. One instance is not meant to be shared across threads;
/// clone the session into a second instance instead (`export_session` /
/// `import_session`).
pub struct SheepitClient {
    client: Client,
    base_url: String,
    jar: CookieJar,
}

/// Byte counts the progress endpoint reports while an upload is running.
#[derive(Deserialize)]
struct ProgressPayload {
    bytes_processed: f64,
    content_length: f64,
}

impl SheepitClient {
    /// Build a client against the base URL from the `SHEEPIT_URL`
    /// environment variable, falling back to the production site.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SHEEPIT_URL")
            .unwrap_or_else(|_| "https://www.sheepit-renderfarm.com".into());
        SheepitClient::new(base_url)
    }

    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let domain = reqwest::Url::parse(&base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .ok_or_else(|| Error::Unexpected(format!("invalid base url: {}", base_url)))?;
        let client = Client::builder()
            .build()
            .map_err(|err| Error::Unexpected(format!("failed to build HTTP client: {}", err)))?;
        Ok(SheepitClient {
            client,
            base_url,
            jar: CookieJar::new(domain),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attach the session cookies, send, and capture any cookies the server
    /// set in return. All transport failures map to `Error::Network`.
    fn send(&mut self, request: RequestBuilder) -> Result<Response> {
        let request = match self.jar.header_value() {
            Some(cookies) => request.header(COOKIE, cookies),
            None => request,
        };
        let response = request.send()?;
        for value in response.headers().get_all(SET_COOKIE) {
            if let Ok(header) = value.to_str() {
                self.jar.store_set_cookie(header);
            }
        }
        Ok(response)
    }

    /// Authenticate the session. On success the server's session cookies
    /// are stored in the jar; use `export_session` to persist them.
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let url = format!("{}/ajax.php", self.base_url);
        let form = [
            ("login", username),
            ("password", password),
            ("do_login", "do_login"),
            ("timezone", "Europe/Berlin"),
            ("account_login", "account_login"),
        ];
        let request = self.client.post(&url).form(&form).timeout(TIMEOUT);
        let response = self.send(request)?;
        // The endpoint answers with the literal "OK" and nothing else on
        // success.
        if response.text()? != "OK" {
            return Err(Error::Login("wrong username and/or password".into()));
        }
        Ok(())
    }

    /// Tell the server to end the session, then drop the local cookies.
    /// The cookies are cleared even when the request fails; the failure is
    /// still reported afterwards.
    pub fn logout(&mut self) -> Result<()> {
        let url = format!("{}/account.php?mode=logout", self.base_url);
        let request = self.client.get(&url).timeout(TIMEOUT);
        let result = self.send(request);
        self.jar.clear();
        result.map(|_| ())
    }

    /// Whether the session is currently authenticated. An empty cookie jar
    /// answers false without touching the network; otherwise the login page
    /// is probed, and a redirect to the site root means "already logged in".
    pub fn is_logged_in(&mut self) -> Result<bool> {
        if self.jar.is_empty() {
            return Ok(false);
        }
        let url = format!("{}/account.php?mode=login", self.base_url);
        let request = self.client.get(&url).timeout(TIMEOUT);
        let response = self.send(request)?;
        Ok(response.url().as_str() == format!("{}/", self.base_url))
    }

    /// Fetch and scrape the account profile page. This does not fail on an
    /// unauthenticated session; check `Profile::is_authenticated` on the
    /// result.
    pub fn get_profile(&mut self) -> Result<Profile> {
        let url = format!("{}/account.php?mode=profile", self.base_url);
        let request = self.client.get(&url).timeout(TIMEOUT);
        let response = self.send(request)?;
        Ok(scrape::parse_profile(&response.text()?))
    }

    /// Ask the server for an upload token. Each upload attempt needs a
    /// fresh one; the same token is later passed to `upload_file`,
    /// `upload_progress` and `add_job`.
    pub fn request_upload_token(&mut self) -> Result<String> {
        let url = format!("{}/getstarted.php", self.base_url);
        let request = self.client.get(&url).timeout(TIMEOUT);
        let response = self.send(request)?;
        let token = scrape::parse_upload_token(&response.text()?);
        if token.is_empty() {
            // The page omits the token form once the account is at its
            // simultaneous-project cap.
            return Err(Error::UploadLimit(
                "maximum number of simultaneous projects reached".into(),
            ));
        }
        Ok(token)
    }

    /// Stream the project archive to the server as multipart form data.
    /// The token doubles as the upload-progress correlation id, so
    /// `upload_progress` can be polled from another client instance while
    /// this call blocks. No timeout: uploads take as long as they take.
    pub fn upload_file(&mut self, token: &str, path: &Path) -> Result<()> {
        let file = File::open(path)?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("project.blend")
            .to_string();
        let part = multipart::Part::reader(file).file_name(file_name);
        let form = multipart::Form::new()
            .text("step", "1")
            .text("transfertmethod", "File")
            .text("token", token.to_string())
            .text("PHP_SESSION_UPLOAD_PROGRESS", token.to_string())
            .text("mode", "add")
            .part("addjob_archive", part);
        let url = format!("{}/jobs.php", self.base_url);
        let request = self
            .client
            .post(&url)
            .multipart(form)
            .header("Prefer", "respond-async");
        self.send(request)?;
        Ok(())
    }

    /// Poll how far the upload identified by `token` has progressed.
    /// Returns a ratio in `[0, 1]`, or `None` while the server has nothing
    /// to report yet (the payload only appears once bytes are flowing).
    pub fn upload_progress(&mut self, token: &str) -> Result<Option<f64>> {
        let url = format!("{}/ajax.php", self.base_url);
        let form = [
            ("addjob", "addjob"),
            ("upload_progress", "upload_progress"),
            ("token", token),
        ];
        let request = self.client.post(&url).form(&form).timeout(TIMEOUT);
        let response = self.send(request)?;
        let body = response.text()?;
        let payload: ProgressPayload = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(_) => return Ok(None),
        };
        if payload.content_length <= 0.0 {
            return Ok(None);
        }
        Ok(Some(payload.bytes_processed / payload.content_length))
    }

    /// Submit the uploaded archive as a render job. Step one fetches the
    /// configuration page the server pre-filled from the archive and
    /// scrapes its defaults; step two posts those defaults merged with the
    /// caller's options.
    pub fn add_job(&mut self, token: &str, options: &JobOptions) -> Result<()> {
        let url = format!("{}/jobs.php?mode=add&step=2&token={}", self.base_url, token);
        let request = self.client.get(&url).timeout(TIMEOUT);
        let response = self.send(request)?;
        let form = scrape::parse_job_form(&response.text()?);

        let compute_method = options.devices.bitmask_for_engine(&form.engine);
        let (job_type, start_frame, end_frame, step_frame) = match options.frames {
            RenderFrames::Animation { start, end, step } => ("animation", start, end, step),
            RenderFrames::SingleFrame(frame) => ("singleframe", frame, 0, 1),
        };
        let (split_tiles, split_samples) = match options.split {
            FrameSplit::Tiles(tiles) => (tiles, None),
            FrameSplit::Layers(samples) => (-1, Some(samples)),
        };

        let mut settings: Vec<(&str, String)> = vec![
            ("addjob", "addjob".into()),
            ("do_addjob", "do_addjob".into()),
            ("token", token.into()),
            ("type", job_type.into()),
            ("compute_method", compute_method.to_string()),
            ("executable", EXECUTABLE.into()),
            ("engine", form.engine.clone()),
            ("public_render", if options.public { "1" } else { "0" }.into()),
            ("public_thumbnail", "0".into()),
            ("generate_mp4", if options.mp4 { "1" } else { "0" }.into()),
            ("start_frame", start_frame.to_string()),
            ("end_frame", end_frame.to_string()),
            ("step_frame", step_frame.to_string()),
            ("archive", form.archive),
            ("max_ram_optional", String::new()),
            ("path", form.path),
            ("framerate", form.framerate),
            ("split_tiles", split_tiles.to_string()),
            ("exr", "0".into()),
            ("cycles_samples", form.cycles_samples),
            ("samples_pixel", form.samples_pixel),
            ("image_extension", form.image_extension),
        ];
        if let Some(samples) = split_samples {
            settings.push(("split_samples", samples.to_string()));
        }

        let url = format!("{}/ajax.php", self.base_url);
        let request = self.client.post(&url).form(&settings).timeout(TIMEOUT);
        let response = self.send(request)?;
        // The site sends no machine-readable acceptance signal, so the body
        // is not interpreted; a transport-level rejection is still surfaced.
        if !response.status().is_success() {
            return Err(Error::Unexpected(format!(
                "job submission returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// All session cookies as a flat name -> value mapping, ready for JSON
    /// persistence. `import_session` restores them.
    pub fn export_session(&self) -> HashMap<String, String> {
        self.jar.export()
    }

    /// Install a previously exported cookie mapping on this client's
    /// domain.
    pub fn import_session(&mut self, cookies: HashMap<String, String>) {
        self.jar.import(cookies);
    }

    /// Drop the local cookies without telling the server. `logout` is the
    /// polite version; this one is for discarding a session the server
    /// already considers dead.
    pub fn clear_session(&mut self) {
        self.jar.clear();
    }
}
