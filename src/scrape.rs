// Scrapers for the three server-rendered pages the workflow depends on.
// The markup belongs to a third-party PHP site, so all of the coupling to
// its exact tags lives in this module: if the site changes, only these
// functions need touching, not the client's call sequence.
//
// Every function is a pure &str -> value pass over `scraper`'s parsed
// document. Missing or malformed markup yields empty/default values, never
// an error.

use scraper::{ElementRef, Html, Selector};

/// Account statistics scraped from the profile page. Each field stays `None`
/// until its label was found in the markup. An absent `points` value means
/// the session is not authenticated (the site serves the login page instead
/// of the stats list in that case).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub projects_created: Option<String>,
    pub frames_ordered: Option<String>,
    pub rendered_frames: Option<String>,
    pub accumulated_render: Option<String>,
    pub rank: Option<String>,
    pub points: Option<String>,
    pub team: Option<String>,
    pub registration: Option<String>,
}

impl Profile {
    /// The profile page only shows the stats list to an authenticated
    /// session, so a populated Points field doubles as a login check.
    pub fn is_authenticated(&self) -> bool {
        self.points.is_some()
    }

    fn slot_mut(&mut self, label: &str) -> Option<&mut Option<String>> {
        match label {
            "Projects created" => Some(&mut self.projects_created),
            "Frames ordered" => Some(&mut self.frames_ordered),
            "Rendered frames" => Some(&mut self.rendered_frames),
            "Accumulated render" => Some(&mut self.accumulated_render),
            "Rank" => Some(&mut self.rank),
            "Points" => Some(&mut self.points),
            "Team" => Some(&mut self.team),
            "Registration" => Some(&mut self.registration),
            _ => None,
        }
    }
}

/// Default values for the job-creation form, scraped from the step-2 page.
/// Fields the page did not contain stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobForm {
    pub engine: String,
    pub archive: String,
    pub path: String,
    pub framerate: String,
    pub cycles_samples: String,
    pub samples_pixel: String,
    pub image_extension: String,
}

/// Scrape the profile page's description list. Labels may appear in any
/// order; unknown labels are skipped.
pub fn parse_profile(html: &str) -> Profile {
    let document = Html::parse_document(html);
    let dt_selector = Selector::parse("dt").unwrap();

    let mut profile = Profile::default();
    for dt in document.select(&dt_selector) {
        let label = dt.text().collect::<String>().trim().to_string();
        let Some(slot) = profile.slot_mut(&label) else {
            continue;
        };
        // The value is the text of the <dd> following this <dt>.
        let dd = dt
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "dd");
        if let Some(dd) = dd {
            let text = dd.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                *slot = Some(text);
            }
        }
    }
    profile
}

/// Pull the upload token out of the get-started page. Returns an empty
/// string when no token input exists, which the client interprets as the
/// simultaneous-project cap being reached.
///
/// When several token inputs are present the last one wins, matching the
/// site's observed behavior of rendering the live form last.
pub fn parse_upload_token(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"input[name="token"]"#).unwrap();
    document
        .select(&selector)
        .filter_map(|input| input.value().attr("value"))
        .last()
        .unwrap_or("")
        .to_string()
}

/// Scrape the seven pre-filled inputs of the job-creation step-2 page.
pub fn parse_job_form(html: &str) -> JobForm {
    let document = Html::parse_document(html);
    JobForm {
        engine: input_value(&document, "addjob_engine_0"),
        archive: input_value(&document, "addjob_archive_0"),
        path: input_value(&document, "addjob_path_0"),
        framerate: input_value(&document, "addjob_framerate_0"),
        cycles_samples: input_value(&document, "addjob_cycles_samples_0"),
        samples_pixel: input_value(&document, "addjob_samples_pixel_0"),
        image_extension: input_value(&document, "addjob_image_extension_0"),
    }
}

fn input_value(document: &Html, id: &str) -> String {
    let selector = Selector::parse(&format!("input#{}", id)).unwrap();
    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .unwrap_or("")
        .to_string()
}
