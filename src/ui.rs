// UI layer: interactive menu over the SheepIt client using `dialoguer`.
// The flow mirrors the browser workflow: log in once, then send projects
// and watch their upload progress. The session cookies are persisted to a
// file in the home directory so a later run can continue without a new
// login.

use crate::api::{SheepitClient, REGISTER_URL};
use crate::error::Error;
use crate::job::{FrameSplit, JobOptions, RenderDevices, RenderFrames};
use crate::prepare::{self, PrepareOutcome};

use anyhow::{anyhow, Result};
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// What gets persisted between runs: the username (for display only) and
/// the exported cookie mapping.
#[derive(Serialize, Deserialize, Default)]
struct SavedSession {
    username: String,
    cookies: HashMap<String, String>,
}

/// Main interactive menu. Restores a persisted session if one exists, then
/// runs a select loop until the user chooses "Exit".
pub fn main_menu(mut api: SheepitClient) -> Result<()> {
    if let Some(saved) = load_session() {
        println!("Restored session for {}", saved.username);
        api.import_session(saved.cookies);
    }

    loop {
        let items = vec![
            "Login",
            "Show profile",
            "Send project",
            "Logout",
            "Create account",
            "Exit",
        ];
        let selection = Select::new().items(&items).default(0).interact()?;
        match selection {
            0 => handle_login(&mut api)?,
            1 => handle_profile(&mut api)?,
            2 => handle_send_project(&mut api)?,
            3 => handle_logout(&mut api),
            4 => {
                // No browser automation; just show where to sign up.
                println!("Create an account at: {}", REGISTER_URL);
            }
            5 => break,
            _ => {}
        }
    }
    Ok(())
}

/// Collect credentials, log in, and persist the session cookies on success.
fn handle_login(api: &mut SheepitClient) -> Result<()> {
    let username: String = Input::new().with_prompt("Username").interact_text()?;
    let password: String = Password::new().with_prompt("Password").interact()?;

    let spinner = spinner("Logging in...");
    let result = api.login(&username, &password);
    spinner.finish_and_clear();

    match result {
        Ok(()) => {
            persist_session(&SavedSession {
                username,
                cookies: api.export_session(),
            })?;
            println!("Logged in.");
        }
        Err(err) => println!("Login failed: {}", err),
    }
    Ok(())
}

/// Fetch and print the profile. An unauthenticated snapshot means the
/// stored session has expired, so forget it.
fn handle_profile(api: &mut SheepitClient) -> Result<()> {
    let spinner = spinner("Fetching profile...");
    let result = api.get_profile();
    spinner.finish_and_clear();

    let profile = match result {
        Ok(profile) => profile,
        Err(err) => {
            println!("Could not fetch profile: {}", err);
            return Ok(());
        }
    };
    if !profile.is_authenticated() {
        println!("Please log in.");
        forget_session(api);
        return Ok(());
    }

    let dash = || "-".to_string();
    println!("Projects created:   {}", profile.projects_created.clone().unwrap_or_else(dash));
    println!("Frames ordered:     {}", profile.frames_ordered.clone().unwrap_or_else(dash));
    println!("Rendered frames:    {}", profile.rendered_frames.clone().unwrap_or_else(dash));
    println!("Accumulated render: {}", profile.accumulated_render.clone().unwrap_or_else(dash));
    println!("Rank:               {}", profile.rank.clone().unwrap_or_else(dash));
    println!("Points:             {}", profile.points.clone().unwrap_or_else(dash));
    println!("Team:               {}", profile.team.clone().unwrap_or_else(dash));
    println!("Registration:       {}", profile.registration.clone().unwrap_or_else(dash));
    Ok(())
}

/// Best-effort logout: the remote call may fail, the local state goes away
/// regardless.
fn handle_logout(api: &mut SheepitClient) {
    if let Err(err) = api.logout() {
        println!("Logout request failed ({}), local session cleared anyway.", err);
    } else {
        println!("Logged out.");
    }
    delete_session_file();
}

/// The full send workflow: pick a file, check the prepare log, verify the
/// session, get a token, upload with a progress bar, then configure and
/// submit the job.
fn handle_send_project(api: &mut SheepitClient) -> Result<()> {
    let path = match pick_project_file()? {
        Some(path) => path,
        None => {
            println!("No file selected.");
            return Ok(());
        }
    };

    // Warn if the scene-preparation step reported a failure.
    match prepare::read_outcome(&path) {
        Ok(Some(PrepareOutcome::Err(message))) => {
            println!("Scene preparation failed: {}", message);
            if !Confirm::new().with_prompt("Upload anyway?").interact()? {
                return Ok(());
            }
        }
        Ok(Some(PrepareOutcome::Ok)) | Ok(None) => {}
        Err(err) => println!("Could not read prepare log: {}", err),
    }

    match api.is_logged_in() {
        Ok(true) => {}
        Ok(false) => {
            println!("Please log in first.");
            forget_session(api);
            return Ok(());
        }
        Err(err) => {
            println!("Could not verify session: {}", err);
            return Ok(());
        }
    }

    let token = match api.request_upload_token() {
        Ok(token) => token,
        Err(err @ Error::UploadLimit(_)) => {
            println!("{}", err);
            return Ok(());
        }
        Err(err) => {
            println!("Could not get an upload token: {}", err);
            return Ok(());
        }
    };

    if let Err(err) = upload_with_progress(api, &token, &path) {
        println!("{}", err);
        return Ok(());
    }

    let options = ask_job_options()?;
    let spinner = spinner("Submitting job...");
    let result = api.add_job(&token, &options);
    spinner.finish_and_clear();
    match result {
        Ok(()) => println!("Job submitted. Check the website for its status."),
        Err(err) => println!("Job submission failed: {}", err),
    }
    Ok(())
}

/// Upload on this thread while a second client instance polls the progress
/// endpoint from a background thread. The client is not meant for
/// concurrent calls, so the poller gets its own session copy.
fn upload_with_progress(api: &mut SheepitClient, token: &str, path: &PathBuf) -> Result<()> {
    let mut poller = SheepitClient::new(api.base_url())
        .map_err(|err| anyhow!("failed to build progress poller: {}", err))?;
    poller.import_session(api.export_session());

    let bar = ProgressBar::new(100);
    bar.set_style(ProgressStyle::with_template("{bar:40} {percent}% {msg}").unwrap());
    bar.set_message("Uploading...");

    let stop = Arc::new(AtomicBool::new(false));
    let poll_stop = stop.clone();
    let poll_bar = bar.clone();
    let poll_token = token.to_string();
    let handle = thread::spawn(move || {
        while !poll_stop.load(Ordering::Relaxed) {
            if let Ok(Some(ratio)) = poller.upload_progress(&poll_token) {
                poll_bar.set_position((ratio * 100.0).round() as u64);
            }
            thread::sleep(Duration::from_millis(500));
        }
    });

    let result = api.upload_file(token, path);
    stop.store(true, Ordering::Relaxed);
    let _ = handle.join();
    bar.finish_and_clear();

    match result {
        Ok(()) => {
            println!("Upload complete.");
            Ok(())
        }
        Err(err) => Err(anyhow!("upload failed: {}", err)),
    }
}

/// Ask for everything `add_job` needs.
fn ask_job_options() -> Result<JobOptions> {
    let kinds = vec!["Single frame", "Animation"];
    let frames = match Select::new().items(&kinds).default(0).interact()? {
        1 => {
            let start: i32 = Input::new().with_prompt("Start frame").interact_text()?;
            let end: i32 = Input::new().with_prompt("End frame").interact_text()?;
            let step: i32 = Input::new().with_prompt("Frame step").default(1).interact_text()?;
            RenderFrames::Animation { start, end, step }
        }
        _ => {
            let frame: i32 = Input::new().with_prompt("Frame").interact_text()?;
            RenderFrames::SingleFrame(frame)
        }
    };

    let devices = RenderDevices {
        cpu: Confirm::new().with_prompt("Render on CPU?").default(true).interact()?,
        cuda: Confirm::new().with_prompt("Render on Nvidia GPUs (CUDA)?").default(false).interact()?,
        opencl: Confirm::new().with_prompt("Render on AMD GPUs (OpenCL)?").default(false).interact()?,
    };

    // Same tile choices the website offers.
    let splits = vec!["Full frame", "2x2", "4x4", "5x5", "6x6"];
    let tiles = [1, 2, 4, 5, 6][Select::new()
        .with_prompt("Split each frame in")
        .items(&splits)
        .default(0)
        .interact()?];

    let public = Confirm::new()
        .with_prompt("Renderable by all members?")
        .default(true)
        .interact()?;
    let mp4 = Confirm::new()
        .with_prompt("Generate MP4 video?")
        .default(false)
        .interact()?;

    Ok(JobOptions {
        devices,
        frames,
        split: FrameSplit::Tiles(tiles),
        public,
        mp4,
    })
}

/// Native file dialog first, plain prompt as fallback for headless use.
fn pick_project_file() -> Result<Option<PathBuf>> {
    let picked = rfd::FileDialog::new()
        .add_filter("Blender project", &["blend", "zip"])
        .pick_file();
    if picked.is_some() {
        return Ok(picked);
    }
    let path: String = Input::new()
        .with_prompt("Project file path (empty to cancel)")
        .allow_empty(true)
        .interact_text()?;
    if path.is_empty() {
        Ok(None)
    } else {
        Ok(Some(PathBuf::from(path)))
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Forget both the in-memory cookies and the persisted session file, used
/// whenever an authentication check comes back negative.
fn forget_session(api: &mut SheepitClient) {
    // Clearing via logout would hit the network; dropping the jar and the
    // file is enough here.
    api.clear_session();
    delete_session_file();
}

fn session_file() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(".sheepit_session")
}

fn persist_session(session: &SavedSession) -> Result<()> {
    let data = serde_json::to_string(session)?;
    std::fs::write(session_file(), data)?;
    Ok(())
}

fn load_session() -> Option<SavedSession> {
    let data = std::fs::read_to_string(session_file()).ok()?;
    serde_json::from_str(&data).ok()
}

fn delete_session_file() {
    let _ = std::fs::remove_file(session_file());
}
