use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use crate::foundation::error::{SlidecastError, SlidecastResult};
use crate::foundation::layout::{ArtifactId, OutputLayout};
use crate::model::Slide;
use crate::raster::text::{WRAP_WIDTH, escape_markup, layout_bullets, truncate_title};

pub const CANVAS_WIDTH: u32 = 1920;
pub const CANVAS_HEIGHT: u32 = 1080;

const TITLE_Y: u32 = 200;
const BODY_X: u32 = 160;
const BODY_TOP_Y: u32 = 350;
const LINE_PITCH: u32 = 60;
const BULLET_GAP: u32 = 10;
// Lines whose baseline would land below this collide with the footer and are dropped.
const BODY_BOTTOM_Y: u32 = 960;
const FOOTER_X: u32 = 1800;
const FOOTER_Y: u32 = 1000;

/// A rasterized slide on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedFrame {
    /// 1-based position; matches the `%d` in the layout's frame pattern.
    pub slide_number: usize,
    pub path: PathBuf,
}

/// Build the SVG document for one slide. `slide_number` is 1-based.
pub fn compose_slide_svg(slide: &Slide, slide_number: usize, total_slides: usize) -> String {
    let title = escape_markup(&truncate_title(&slide.display_title(slide_number)));

    let mut tspans = String::new();
    let mut y = BODY_TOP_Y;
    let mut dropped = 0usize;
    for (i, line) in layout_bullets(&slide.bullet_points, WRAP_WIDTH)
        .iter()
        .enumerate()
    {
        if line.starts_bullet && i > 0 {
            y += BULLET_GAP;
        }
        if y > BODY_BOTTOM_Y {
            dropped += 1;
            continue;
        }
        let _ = write!(
            tspans,
            r#"<tspan x="{BODY_X}" y="{y}">{}</tspan>"#,
            escape_markup(&line.text)
        );
        y += LINE_PITCH;
    }
    if dropped > 0 {
        tracing::warn!(slide_number, dropped, "slide body overflows canvas, lines dropped");
    }

    format!(
        r##"<svg width="{CANVAS_WIDTH}" height="{CANVAS_HEIGHT}" xmlns="http://www.w3.org/2000/svg">
  <defs>
    <linearGradient id="bg" x1="0%" y1="0%" x2="100%" y2="100%">
      <stop offset="0%" stop-color="#6366f1"/>
      <stop offset="100%" stop-color="#10b981"/>
    </linearGradient>
  </defs>
  <rect width="100%" height="100%" fill="url(#bg)"/>
  <text x="960" y="{TITLE_Y}" font-family="Arial, sans-serif" font-size="72" font-weight="bold" text-anchor="middle" fill="#ffffff">{title}</text>
  <text xml:space="preserve" font-family="Arial, sans-serif" font-size="40" fill="#ffffff">{tspans}</text>
  <text x="{FOOTER_X}" y="{FOOTER_Y}" font-family="Arial, sans-serif" font-size="36" text-anchor="middle" fill="#ffffff" fill-opacity="0.85">{slide_number} / {total_slides}</text>
</svg>
"##
    )
}

#[derive(Clone, Debug, Default)]
pub struct RasterizerOpts {
    /// Worker threads for parallel slide rendering. `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Extra directory scanned for `.ttf`/`.otf`/`.ttc` files.
    pub fonts_dir: Option<PathBuf>,
}

/// Renders slides into PNG frames at a fixed 1920x1080 canvas.
pub struct Rasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
    pool: rayon::ThreadPool,
}

impl Rasterizer {
    pub fn new(opts: &RasterizerOpts) -> SlidecastResult<Self> {
        let fontdb = build_fontdb(opts.fonts_dir.as_deref());
        tracing::debug!(faces = fontdb.faces().count(), "font database ready");
        Self::with_fontdb(Arc::new(fontdb), opts.threads)
    }

    /// Use a prebuilt font database (tests pass an empty one to skip system font discovery).
    pub fn with_fontdb(
        fontdb: Arc<usvg::fontdb::Database>,
        threads: Option<usize>,
    ) -> SlidecastResult<Self> {
        Ok(Self {
            fontdb,
            pool: build_thread_pool(threads)?,
        })
    }

    /// Render one slide to `out`. `slide_number` is 1-based.
    pub fn render_slide(
        &self,
        slide: &Slide,
        slide_number: usize,
        total_slides: usize,
        out: &Path,
    ) -> SlidecastResult<RenderedFrame> {
        let svg = compose_slide_svg(slide, slide_number, total_slides);
        let rgba = self
            .rasterize(&svg)
            .map_err(|cause| SlidecastError::rasterization(slide_number, cause))?;

        image::save_buffer_with_format(
            out,
            &rgba,
            CANVAS_WIDTH,
            CANVAS_HEIGHT,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| {
            SlidecastError::rasterization(slide_number, format!("write '{}': {e}", out.display()))
        })?;

        Ok(RenderedFrame {
            slide_number,
            path: out.to_path_buf(),
        })
    }

    /// Render every slide of a run in parallel. Any failure aborts the whole set; frames already
    /// written stay on disk under the run's unique names.
    #[tracing::instrument(skip(self, slides, layout), fields(slides = slides.len()))]
    pub fn render_all(
        &self,
        slides: &[Slide],
        layout: &OutputLayout,
        id: &ArtifactId,
    ) -> SlidecastResult<Vec<RenderedFrame>> {
        let total = slides.len();
        let mut frames = self.pool.install(|| {
            slides
                .par_iter()
                .enumerate()
                .map(|(i, slide)| {
                    let n = i + 1;
                    self.render_slide(slide, n, total, &layout.frame_path(id, n))
                })
                .collect::<SlidecastResult<Vec<_>>>()
        })?;
        frames.sort_by_key(|f| f.slide_number);
        Ok(frames)
    }

    fn rasterize(&self, svg: &str) -> Result<Vec<u8>, String> {
        let opts = usvg::Options {
            fontdb: self.fontdb.clone(),
            font_resolver: make_font_resolver(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(svg, &opts).map_err(|e| format!("parse svg: {e}"))?;

        let mut pixmap = resvg::tiny_skia::Pixmap::new(CANVAS_WIDTH, CANVAS_HEIGHT)
            .ok_or_else(|| "failed to allocate slide pixmap".to_string())?;
        let sx = CANVAS_WIDTH as f32 / tree.size().width();
        let sy = CANVAS_HEIGHT as f32 / tree.size().height();
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::from_scale(sx, sy),
            &mut pixmap.as_mut(),
        );

        let mut data = pixmap.take();
        demultiply_rgba8_in_place(&mut data);
        Ok(data)
    }
}

fn demultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        px[0] = ((px[0] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[1] = ((px[1] as u16 * 255 + a / 2) / a).min(255) as u8;
        px[2] = ((px[2] as u16 * 255 + a / 2) / a).min(255) as u8;
    }
}

fn build_thread_pool(threads: Option<usize>) -> SlidecastResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(SlidecastError::validation(
            "render 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("slidecast-raster-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| SlidecastError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}

fn build_fontdb(fonts_dir: Option<&Path>) -> usvg::fontdb::Database {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    if let Some(dir) = fonts_dir {
        load_fonts_from_dir(&mut db, dir);
    }
    db
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "fonts directory is not readable");
        return;
    };

    for entry in rd.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if ext != "ttf" && ext != "otf" && ext != "ttc" {
            continue;
        }
        let _ = db.load_font_file(&path);
    }
}

// Slides ask for Arial; hosts without it should still get text, so every query falls back
// through the generic families.
fn make_font_resolver() -> usvg::FontResolver<'static> {
    usvg::FontResolver {
        select_font: Box::new(|font, fontdb| {
            let mut families = Vec::<usvg::fontdb::Family<'_>>::new();
            for family in font.families() {
                families.push(match family {
                    usvg::FontFamily::Serif => usvg::fontdb::Family::Serif,
                    usvg::FontFamily::SansSerif => usvg::fontdb::Family::SansSerif,
                    usvg::FontFamily::Cursive => usvg::fontdb::Family::Cursive,
                    usvg::FontFamily::Fantasy => usvg::fontdb::Family::Fantasy,
                    usvg::FontFamily::Monospace => usvg::fontdb::Family::Monospace,
                    usvg::FontFamily::Named(s) => usvg::fontdb::Family::Name(s),
                });
            }
            families.push(usvg::fontdb::Family::SansSerif);
            families.push(usvg::fontdb::Family::Serif);

            let style = match font.style() {
                usvg::FontStyle::Normal => usvg::fontdb::Style::Normal,
                usvg::FontStyle::Italic => usvg::fontdb::Style::Italic,
                usvg::FontStyle::Oblique => usvg::fontdb::Style::Oblique,
            };

            let query = usvg::fontdb::Query {
                families: &families,
                weight: usvg::fontdb::Weight(font.weight()),
                stretch: usvg::fontdb::Stretch::Normal,
                style,
            };

            fontdb
                .query(&query)
                .or_else(|| fontdb.faces().next().map(|face| face.id))
        }),
        select_fallback: usvg::FontResolver::default_fallback_selector(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/slide.rs"]
mod tests;
