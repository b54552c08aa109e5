// Parameter types for job submission. These only describe what the caller
// chose; the remaining form fields come from the step-2 page scrape and are
// merged in by `api::SheepitClient::add_job`.

/// Which compute devices the farm may render the project on.
///
/// Cycles projects pick any combination of the three; the site encodes the
/// selection as a bitmask (CPU=1, CUDA=2, OPENCL=4). Eevee renders on GPU
/// only, so CPU is dropped from the mask for that engine no matter what the
/// caller asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderDevices {
    pub cpu: bool,
    pub cuda: bool,
    pub opencl: bool,
}

/// Engine name the site uses for Eevee on the step-2 page.
pub const EEVEE_ENGINE: &str = "BLENDER_EEVEE";

impl RenderDevices {
    pub fn bitmask(&self) -> u8 {
        let mut mask = 0;
        if self.cpu {
            mask += 1;
        }
        if self.cuda {
            mask += 2;
        }
        if self.opencl {
            mask += 4;
        }
        mask
    }

    /// Bitmask adjusted for the engine the server scraped out of the
    /// project archive.
    pub fn bitmask_for_engine(&self, engine: &str) -> u8 {
        if engine == EEVEE_ENGINE {
            RenderDevices { cpu: false, ..*self }.bitmask()
        } else {
            self.bitmask()
        }
    }
}

/// What to render: a frame range or one still frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFrames {
    Animation { start: i32, end: i32, step: i32 },
    SingleFrame(i32),
}

/// How each frame is divided among renderers. Tiles cut the image into an
/// NxN chessboard; layers split the sample count instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSplit {
    Tiles(i32),
    Layers(i32),
}

impl Default for FrameSplit {
    fn default() -> Self {
        // Full frame, no split.
        FrameSplit::Tiles(1)
    }
}

/// Everything the caller decides about a submission.
#[derive(Debug, Clone, Copy)]
pub struct JobOptions {
    pub devices: RenderDevices,
    pub frames: RenderFrames,
    pub split: FrameSplit,
    /// Whether every member of the farm may render the project.
    pub public: bool,
    /// Ask the server to assemble an MP4 of the result.
    pub mp4: bool,
}
