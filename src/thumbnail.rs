use eframe::egui::ColorImage;

/// Downloads and decodes a thumbnail image. Returns `None` on any failure.
pub fn fetch_thumbnail(url: &str) -> Option<ColorImage> {
    if !url.starts_with("http") {
        return None;
    }
    // Perform a blocking HTTP GET request, returning None on any error
    let resp = reqwest::blocking::get(url).ok()?.error_for_status().ok()?.bytes().ok()?;
    // Load image data into an image::DynamicImage and convert to RGBA8
    let img = image::load_from_memory(&resp).ok()?.to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Some(ColorImage::from_rgba_unmultiplied(size, &img))
}
