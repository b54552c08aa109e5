// Library root
// -----------
// Client for the SheepIt renderfarm website: log in, upload a project
// archive, configure and submit a render job, and poll upload progress.
// The site has no real API, so the client replays a browser's form posts
// and scrapes the answers out of server-rendered pages.
//
// Module responsibilities:
// - `api`: the session client; one cookie-bearing HTTP session and the
//   ordered exchanges of the workflow.
// - `scrape`: the three page scrapers (profile stats, upload token,
//   job-form defaults). All markup coupling lives here.
// - `session`: the explicit domain-scoped cookie jar and its JSON-friendly
//   export/import mapping.
// - `job`: job submission parameter types and the device bitmask.
// - `prepare`: reads the scene-preparation script's outcome log.
// - `error`: the Network / Login / UploadLimit / Unexpected taxonomy.
// - `ui`: the interactive terminal front end used by the binary.

pub mod api;
pub mod error;
pub mod job;
pub mod prepare;
pub mod scrape;
pub mod session;
pub mod ui;

pub use api::SheepitClient;
pub use error::{Error, Result};
pub use job::{FrameSplit, JobOptions, RenderDevices, RenderFrames};
pub use scrape::{JobForm, Profile};
