use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbaImage};
use plotters::prelude::*;
use crate::echogram::axis::format_time;
use crate::echogram::histogram::Histogram;
use crate::echogram::pipeline::EchogramView;
use crate::echogram::EchogramError;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub foreground: RGBColor,
    pub bar: RGBColor,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 900,
            background: RGBColor(255, 255, 255),
            foreground: RGBColor(20, 20, 20),
            bar: RGBColor(31, 119, 180),
        }
    }
}
/// Annotated echogram: title, clock-time x axis and depth y axis (0 m at the top).
pub fn render_echogram_png(view: &EchogramView, style: &PlotStyle) -> Result<Vec<u8>, EchogramError> {
    let geometry = view.raster.geometry();
    let (t0, t1) = (geometry.time.min, geometry.time.max.max(geometry.time.min + 1.0));
    // Depth is plotted negated so shallow water sits at the top of the chart.
    let (d0, d1) = (-geometry.depth.max, -geometry.depth.min);
    let d0 = if d1 - d0 > 0.0 { d0 } else { d1 - 1.0 };
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let caption = format!("Fisheries Acoustics Echogram - {}", view.channel);
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(caption, ("sans-serif", 22).into_font().color(&style.foreground))
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 45)
            .build_cartesian_2d(t0..t1, d0..d1)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("Time")
            .y_desc(if view.depth_degraded {
                "Range sample"
            } else {
                "Depth (m)"
            })
            .x_labels(view.time_ticks.len().max(2))
            .y_labels(view.depth_ticks.len().max(2))
            .x_label_formatter(&|t| format_time(*t, false))
            .y_label_formatter(&|d| format!("{:.0}", -d))
            .draw()?;
        let area = chart.plotting_area().strip_coord_spec();
        let (pw, ph) = area.dim_in_pixel();
        let (w, h) = view.image.dimensions();
        for py in 0..ph {
            let row = (py as u64 * h as u64 / ph.max(1) as u64) as u32;
            for px in 0..pw {
                let col = (px as u64 * w as u64 / pw.max(1) as u64) as u32;
                let [r, g, b, a] = view.image.get_pixel(col, row).0;
                if a == 0 {
                    continue;
                }
                area.draw_pixel((px as i32, py as i32), &RGBColor(r, g, b))?;
            }
        }
        root.present()?;
    }
    encode_rgb_png(&buffer, style.width, style.height)
}
/// Bar chart of a selection histogram.
pub fn render_histogram_png(histogram: &Histogram, style: &PlotStyle) -> Result<Vec<u8>, EchogramError> {
    if histogram.bin_count() == 0 {
        return Err(EchogramError::Plot("histogram has no bins".into()));
    }
    let lo = histogram.edges.first().copied().unwrap_or(0.0);
    let hi = histogram.edges.last().copied().unwrap_or(0.0);
    let hi = if hi > lo { hi } else { lo + 1.0 };
    let peak = histogram.counts.iter().copied().max().unwrap_or(0).max(1);
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                format!("Sv histogram ({} samples)", histogram.total()),
                ("sans-serif", 20).into_font().color(&style.foreground),
            )
            .set_label_area_size(LabelAreaPosition::Left, 55)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(lo..hi, 0u64..peak + peak / 10 + 1)?;
        chart
            .configure_mesh()
            .light_line_style(&style.foreground.mix(0.1))
            .x_desc("Sv (dB)")
            .y_desc("Count")
            .draw()?;
        let bar = style.bar.filled();
        chart.draw_series(
            histogram
                .bins()
                .filter(|&(_, _, count)| count > 0)
                .map(|(a, b, count)| Rectangle::new([(a, 0), (b, count)], bar)),
        )?;
        root.present()?;
    }
    encode_rgb_png(&buffer, style.width, style.height)
}
/// PNG bytes of a colorized raster, one pixel per cell.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, EchogramError> {
    let mut output = Vec::new();
    DynamicImage::ImageRgba8(image.clone()).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
fn encode_rgb_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, EchogramError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| EchogramError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
