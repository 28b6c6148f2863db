//! SVG bar chart of the streamed series.
//!
//! A pure sink: it draws whatever `(label, value)` pairs it is given, in
//! order, and never reorders or aggregates them.

use dioxus::prelude::*;

const WIDTH: f64 = 600.0;
const HEIGHT: f64 = 240.0;
const AXIS_GUTTER: f64 = 36.0;
const LABEL_GUTTER: f64 = 20.0;

/// One bar in chart coordinates.
#[derive(Debug, Clone, PartialEq)]
struct Bar {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    center: f64,
}

/// Lay out bars for `values` against `y_max`.
///
/// Slots are sized for at least `slots` bars so the chart does not
/// rescale horizontally until the expected frame count is exceeded.
fn layout(values: &[f64], y_max: f64, slots: usize) -> Vec<Bar> {
    #[allow(clippy::cast_precision_loss)] // bar counts are tiny
    let slot = (WIDTH - AXIS_GUTTER) / slots.max(values.len()).max(1) as f64;
    let plot_height = HEIGHT - LABEL_GUTTER;
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let height = if y_max > 0.0 {
                (value.max(0.0) / y_max) * plot_height
            } else {
                0.0
            };
            #[allow(clippy::cast_precision_loss)]
            let x = (i as f64).mul_add(slot, AXIS_GUTTER + slot * 0.1);
            Bar {
                x,
                y: plot_height - height,
                width: slot * 0.8,
                height,
                center: x + slot * 0.4,
            }
        })
        .collect()
}

/// Upper bound of the y axis: the largest value, at least 1.
fn axis_max(values: &[f64]) -> f64 {
    values.iter().copied().fold(1.0, f64::max)
}

/// Props for the [`SeriesChart`] component.
#[derive(Props, Clone, PartialEq)]
pub struct SeriesChartProps {
    /// `(label, value)` pairs in display order.
    points: Vec<(String, f64)>,
    /// Frames expected before the job is complete.
    expected: usize,
}

/// Bar chart of region counts per frame, with the latest frame called
/// out underneath.
#[component]
pub fn SeriesChart(props: SeriesChartProps) -> Element {
    let values: Vec<f64> = props.points.iter().map(|(_, v)| *v).collect();
    let y_max = axis_max(&values);
    let bars = layout(&values, y_max, props.expected);
    let view_box = format!("0 0 {WIDTH} {HEIGHT}");
    let baseline = HEIGHT - LABEL_GUTTER;
    let tick_y = HEIGHT - 6.0;
    let y_label_x = AXIS_GUTTER - 4.0;
    let received = props.points.len();
    let expected = props.expected;

    rsx! {
        div { class: "flex flex-col gap-2",
            svg {
                xmlns: "http://www.w3.org/2000/svg",
                view_box: "{view_box}",
                class: "w-full h-auto bg-[var(--preview-bg)] rounded",
                role: "img",
                "aria-label": "Regions per frame",

                line {
                    x1: "{AXIS_GUTTER}",
                    y1: "0",
                    x2: "{AXIS_GUTTER}",
                    y2: "{baseline}",
                    stroke: "var(--border)",
                }
                line {
                    x1: "{AXIS_GUTTER}",
                    y1: "{baseline}",
                    x2: "{WIDTH}",
                    y2: "{baseline}",
                    stroke: "var(--border)",
                }
                text {
                    x: "{y_label_x}",
                    y: "12",
                    text_anchor: "end",
                    font_size: "11",
                    fill: "var(--muted)",
                    "{y_max}"
                }

                for (i, ((label, value), bar)) in props.points.iter().zip(bars.iter()).enumerate() {
                    g { key: "{i}",
                        rect {
                            x: "{bar.x:.1}",
                            y: "{bar.y:.1}",
                            width: "{bar.width:.1}",
                            height: "{bar.height:.1}",
                            fill: "var(--btn-primary)",
                            title { "{label}: {value}" }
                        }
                        text {
                            x: "{bar.center:.1}",
                            y: "{tick_y}",
                            text_anchor: "middle",
                            font_size: "10",
                            fill: "var(--text-secondary)",
                            "{i}"
                        }
                    }
                }
            }

            p { class: "text-sm text-[var(--text-secondary)]",
                "{received} / {expected} frames"
                if let Some((label, value)) = props.points.last() {
                    " · latest {label}: {value}"
                }
            }
        }
    }
}
