//! Conversion of rendered SVG documents into other image formats

use crate::Result;

#[cfg(any(not(feature = "png"), not(feature = "pdf")))]
use eyre::bail;
#[cfg(any(feature = "png", feature = "pdf"))]
use eyre::format_err;

/// Resolution of raster images
#[cfg(feature = "png")]
const DPI: f32 = 150.;

/// Rasterize an SVG document into PNG bytes
#[cfg(feature = "png")]
pub fn svg_to_png(svg: &str) -> Result<Vec<u8>> {
    use resvg::{tiny_skia, usvg};

    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &opt)
        .map_err(|e| format_err!("Could not parse rendered SVG: {}", e))?;

    let scale = DPI / 72.;
    let size = tree.size();
    let (width, height) = (
        (size.width() * scale).ceil() as u32,
        (size.height() * scale).ceil() as u32,
    );
    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| format_err!("Could not allocate a {}x{} image", width, height))?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );
    pixmap
        .encode_png()
        .map_err(|e| format_err!("Could not encode PNG image: {}", e))
}

#[cfg(not(feature = "png"))]
pub fn svg_to_png(_svg: &str) -> Result<Vec<u8>> {
    bail!("Support for png images was not compiled in")
}

/// Convert an SVG document into PDF bytes
#[cfg(feature = "pdf")]
pub fn svg_to_pdf(svg: &str) -> Result<Vec<u8>> {
    use svg2pdf::usvg;

    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &opt)
        .map_err(|e| format_err!("Could not parse rendered SVG: {}", e))?;
    svg2pdf::to_pdf(
        &tree,
        svg2pdf::ConversionOptions::default(),
        svg2pdf::PageOptions::default(),
    )
    .map_err(|e| format_err!("Could not convert plot to PDF: {}", e))
}

#[cfg(not(feature = "pdf"))]
pub fn svg_to_pdf(_svg: &str) -> Result<Vec<u8>> {
    bail!("Support for pdf images was not compiled in")
}
