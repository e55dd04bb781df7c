//! Boxplot and bar-chart generation for step-count result tables.

use crate::config::GraphsConfig;
use crate::error::Error;
use crate::stats::{compute_mean, compute_median, padded_range, percentile_of_sorted};
use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord};
use plotters::{
    coord::{combinators::WithKeyPoints, types::RangedCoordf64},
    prelude::*,
};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Distribution, Uniform};
use std::{
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
};

const COL_WALKING_TYPE: &str = "walking_type";
const COL_PHONE_POSITION: &str = "phone_position";

const FONT_FAMILY: &str = "sans-serif";
const FONT_SIZE_TITLE: i32 = 20;
const FONT_SIZE_LABEL: i32 = 14;

// Half widths in category slots, each slot one unit wide.
const BOX_HALF_WIDTH: f64 = 0.25;
const CAP_HALF_WIDTH: f64 = 0.125;
const BAR_HALF_WIDTH: f64 = 0.3;
const JITTER_HALF_WIDTH: f64 = 0.08;

const POINT_RADIUS_PX: u32 = 3;
const FLIER_RADIUS_PX: u32 = 4;
const MEAN_MARKER_PX: u32 = 6;

const MEDIAN_COLOR: RGBColor = RGBColor(255, 127, 14);
const MEAN_COLOR: RGBColor = RGBColor(44, 160, 44);

/// A CSV table kept as raw text cells.
#[derive(Debug)]
pub struct ResultsTable {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl ResultsTable {
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self, Error> {
        let file = File::open(file.as_ref()).map_err(csv::Error::from)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|header| header.trim().to_string())
            .collect();
        let rows: Vec<StringRecord> = reader.records().collect::<Result<_, _>>()?;
        Ok(Self { headers, rows })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    fn cell<'a>(&self, row: &'a StringRecord, idx: usize) -> &'a str {
        row.get(idx).unwrap_or("").trim()
    }

    /// A column is numeric when it has a value and every non-empty cell is a number.
    fn is_numeric(&self, idx: usize) -> bool {
        let mut cells = self
            .rows
            .iter()
            .map(|row| self.cell(row, idx))
            .filter(|cell| !cell.is_empty())
            .peekable();
        cells.peek().is_some() && cells.all(|cell| cell.parse::<f64>().is_ok())
    }

    /// Locate the step-count column.
    ///
    /// Candidates are tried in order; failing that, the first numeric column
    /// whose name contains "step" is used.
    pub fn find_step_column(&self, candidates: &[String]) -> Result<usize, Error> {
        let by_candidate = candidates
            .iter()
            .filter_map(|name| self.column(name))
            .find(|&idx| self.is_numeric(idx));
        let by_substring = || {
            (0..self.headers.len()).find(|&idx| {
                self.headers[idx].to_lowercase().contains("step") && self.is_numeric(idx)
            })
        };
        by_candidate
            .or_else(by_substring)
            .ok_or_else(|| Error::Schema {
                column: format!("step count (one of {})", candidates.join(", ")),
            })
    }
}

/// One trial of a results table, relative to the ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub walking_type: Option<String>,
    pub phone_position: Option<String>,
    pub steps: f64,
    pub error: f64,
    pub abs_error: f64,
}

/// Trials of a results table ready for plotting.
#[derive(Debug)]
pub struct StepData {
    pub step_col: String,
    pub has_position: bool,
    pub observations: Vec<Observation>,
}

impl StepData {
    /// Rows without a step count are dropped.
    pub fn from_table(table: &ResultsTable, cfg: &GraphsConfig) -> Result<Self, Error> {
        let step_idx = table.find_step_column(&cfg.step_candidates)?;
        let type_idx = table.column(COL_WALKING_TYPE).ok_or_else(|| Error::Schema {
            column: COL_WALKING_TYPE.to_string(),
        })?;
        let pos_idx = table.column(COL_PHONE_POSITION);

        let non_empty = |cell: &str| (!cell.is_empty()).then(|| cell.to_string());

        let mut observations = Vec::with_capacity(table.rows.len());
        for row in &table.rows {
            let cell = table.cell(row, step_idx);
            if cell.is_empty() {
                continue;
            }
            let steps: f64 = cell.parse().map_err(|_| Error::Parse {
                line: row.position().map_or(0, |pos| pos.line()),
                column: table.headers[step_idx].clone(),
                value: cell.to_string(),
            })?;
            let error = steps - cfg.truth;
            observations.push(Observation {
                walking_type: non_empty(table.cell(row, type_idx)),
                phone_position: pos_idx.and_then(|idx| non_empty(table.cell(row, idx))),
                steps,
                error,
                abs_error: error.abs(),
            });
        }

        Ok(Self {
            step_col: table.headers[step_idx].clone(),
            has_position: pos_idx.is_some(),
            observations,
        })
    }

    /// Mean absolute error over all trials.
    pub fn mae(&self) -> Option<f64> {
        let abs_errors: Vec<f64> = self.observations.iter().map(|o| o.abs_error).collect();
        compute_mean(&abs_errors)
    }
}

/// Quantity drawn on the value axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Steps,
    Error,
    AbsError,
}

impl Metric {
    fn value(self, obs: &Observation) -> f64 {
        match self {
            Metric::Steps => obs.steps,
            Metric::Error => obs.error,
            Metric::AbsError => obs.abs_error,
        }
    }
}

/// Category used to split trials into boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Grouping {
    Overall,
    WalkingType,
    PhonePosition,
}

impl Grouping {
    fn key(self, obs: &Observation) -> Option<&str> {
        match self {
            Grouping::Overall => Some("overall"),
            Grouping::WalkingType => obs.walking_type.as_deref(),
            Grouping::PhonePosition => obs.phone_position.as_deref(),
        }
    }

    fn column(self) -> &'static str {
        match self {
            Grouping::Overall => "overall",
            Grouping::WalkingType => COL_WALKING_TYPE,
            Grouping::PhonePosition => COL_PHONE_POSITION,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub values: Vec<f64>,
}

/// Split observations by category, ordered by ascending median then by name.
pub fn group_by_median(
    observations: &[Observation],
    grouping: Grouping,
    metric: Metric,
) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    for obs in observations {
        let Some(key) = grouping.key(obs) else {
            continue;
        };
        let val = metric.value(obs);
        match groups.iter_mut().find(|group| group.name == key) {
            Some(group) => group.values.push(val),
            None => groups.push(Group {
                name: key.to_string(),
                values: vec![val],
            }),
        }
    }

    let mut keyed: Vec<(f64, Group)> = groups
        .into_iter()
        .map(|group| (compute_median(&group.values).unwrap_or(f64::NAN), group))
        .collect();
    keyed.sort_by(|(med_a, a), (med_b, b)| {
        med_a
            .total_cmp(med_b)
            .then_with(|| a.name.cmp(&b.name))
    });
    keyed.into_iter().map(|(_, group)| group).collect()
}

/// Box geometry of one category.
///
/// Quartiles are linearly interpolated. Whiskers stop at the most extreme
/// values within 1.5 IQR of the box; values beyond them are fliers.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_lo: f64,
    pub whisker_hi: f64,
    pub mean: f64,
    pub fliers: Vec<f64>,
}

const WHISKER_FACTOR: f64 = 1.5;

impl BoxStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mean = compute_mean(values)?;
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let q1 = percentile_of_sorted(&sorted, 0.25)?;
        let median = percentile_of_sorted(&sorted, 0.5)?;
        let q3 = percentile_of_sorted(&sorted, 0.75)?;
        let iqr = q3 - q1;
        let reach = (q1 - WHISKER_FACTOR * iqr)..=(q3 + WHISKER_FACTOR * iqr);

        let inside: Vec<f64> = sorted.iter().copied().filter(|val| reach.contains(val)).collect();
        let whisker_lo = inside.first().map_or(q1, |&val| val.min(q1));
        let whisker_hi = inside.last().map_or(q3, |&val| val.max(q3));
        let fliers = sorted
            .iter()
            .copied()
            .filter(|&val| val < whisker_lo || val > whisker_hi)
            .collect();

        Some(Self {
            q1,
            median,
            q3,
            whisker_lo,
            whisker_hi,
            mean,
            fliers,
        })
    }

    /// Whisker stems and caps of the box centred on `x`.
    fn whisker_paths(&self, x: f64) -> [Vec<(f64, f64)>; 4] {
        let cap = |y: f64| vec![(x - CAP_HALF_WIDTH, y), (x + CAP_HALF_WIDTH, y)];
        [
            vec![(x, self.q1), (x, self.whisker_lo)],
            vec![(x, self.q3), (x, self.whisker_hi)],
            cap(self.whisker_lo),
            cap(self.whisker_hi),
        ]
    }
}

/// Horizontal reference line of a boxplot.
#[derive(Debug, Clone, PartialEq)]
struct RefLine {
    value: f64,
    label: String,
}

#[derive(Debug, Clone)]
struct BoxplotSpec {
    file_name: &'static str,
    title: String,
    y_desc: String,
    grouping: Grouping,
    metric: Metric,
    reference: RefLine,
}

/// Renders the full chart set of a results table.
pub struct GraphGenerator {
    cfg: GraphsConfig,
}

impl GraphGenerator {
    pub fn new(cfg: GraphsConfig) -> Self {
        Self { cfg }
    }

    /// Generate every chart for `input` into `out_dir` and return the saved paths.
    ///
    /// The jitter RNG is seeded afresh for each input.
    pub fn generate(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let table =
            ResultsTable::from_file(input).with_context(|| format!("failed to read {input:?}"))?;
        let data = StepData::from_table(&table, &self.cfg)
            .with_context(|| format!("failed to prepare {input:?}"))?;
        if data.observations.is_empty() {
            bail!("{input:?} has no rows with a step count");
        }
        log::info!(
            "loaded {} trials from {input:?} (step column {:?})",
            data.observations.len(),
            data.step_col
        );

        fs::create_dir_all(out_dir).with_context(|| format!("failed to create {out_dir:?}"))?;

        let mut rng = ChaCha12Rng::seed_from_u64(self.cfg.jitter_seed);
        let mut saved = Vec::new();
        for spec in self.boxplot_specs(&data) {
            let path = out_dir.join(spec.file_name);
            let groups = group_by_median(&data.observations, spec.grouping, spec.metric);
            if groups.is_empty() {
                log::warn!("skipping {path:?}: no {} values", spec.grouping.column());
                continue;
            }
            self.draw_boxplot(&path, &spec, &groups, &mut rng)
                .with_context(|| format!("failed to draw {path:?}"))?;
            log::info!("saved {path:?}");
            saved.push(path);
        }

        let path = out_dir.join("overall_mae_bar.png");
        let mae = data.mae().context("no trials to average")?;
        self.draw_mae_bar(&path, mae)
            .with_context(|| format!("failed to draw {path:?}"))?;
        log::info!("saved {path:?}");
        saved.push(path);

        Ok(saved)
    }

    fn boxplot_specs(&self, data: &StepData) -> Vec<BoxplotSpec> {
        let truth = self.cfg.truth;
        let truth_int = truth.trunc() as i64;
        let step_col = &data.step_col;
        let truth_line = RefLine {
            value: truth,
            label: format!("Ground truth ({truth_int})"),
        };
        let zero_line = RefLine {
            value: 0.0,
            label: "Error = 0".to_string(),
        };

        let mut specs = vec![
            BoxplotSpec {
                file_name: "boxplot_steps_overall.png",
                title: format!("Distribution of {step_col} (overall)"),
                y_desc: step_col.clone(),
                grouping: Grouping::Overall,
                metric: Metric::Steps,
                reference: truth_line.clone(),
            },
            BoxplotSpec {
                file_name: "boxplot_error_overall.png",
                title: format!("Error (counted - {truth_int}) overall"),
                y_desc: "error".to_string(),
                grouping: Grouping::Overall,
                metric: Metric::Error,
                reference: RefLine {
                    value: 0.0,
                    label: "Ideal error (0)".to_string(),
                },
            },
        ];

        let mut by_category = |grouping: Grouping, prefix: &'static [&'static str; 3]| {
            let col = grouping.column();
            specs.push(BoxplotSpec {
                file_name: prefix[0],
                title: format!("{step_col} by {col}"),
                y_desc: step_col.clone(),
                grouping,
                metric: Metric::Steps,
                reference: truth_line.clone(),
            });
            specs.push(BoxplotSpec {
                file_name: prefix[1],
                title: format!("Error (counted - {truth_int}) by {col}"),
                y_desc: "error".to_string(),
                grouping,
                metric: Metric::Error,
                reference: zero_line.clone(),
            });
            specs.push(BoxplotSpec {
                file_name: prefix[2],
                title: format!("|Error| by {col} (truth={truth_int})"),
                y_desc: "|error|".to_string(),
                grouping,
                metric: Metric::AbsError,
                reference: zero_line.clone(),
            });
        };

        by_category(
            Grouping::WalkingType,
            &[
                "boxplot_steps_by_walking_type.png",
                "boxplot_error_by_walking_type.png",
                "boxplot_abs_error_by_walking_type.png",
            ],
        );
        if data.has_position {
            by_category(
                Grouping::PhonePosition,
                &[
                    "boxplot_steps_by_phone_position.png",
                    "boxplot_error_by_phone_position.png",
                    "boxplot_abs_error_by_phone_position.png",
                ],
            );
        }

        specs
    }

    fn draw_boxplot(
        &self,
        path: &Path,
        spec: &BoxplotSpec,
        groups: &[Group],
        rng: &mut ChaCha12Rng,
    ) -> Result<()> {
        let boxes: Vec<(f64, BoxStats)> = groups
            .iter()
            .enumerate()
            .filter_map(|(idx, group)| Some((idx as f64, BoxStats::from_values(&group.values)?)))
            .collect();
        if boxes.is_empty() {
            bail!("no values to plot for {:?}", spec.grouping.column());
        }
        let names: Vec<&str> = groups.iter().map(|group| group.name.as_str()).collect();

        let (y_min, y_max) = value_range(groups, spec.reference.value);

        let root = BitMapBackend::new(path, (self.cfg.width, self.cfg.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&spec.title, (FONT_FAMILY, FONT_SIZE_TITLE))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(slot_axis(names.len()), y_min..y_max)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(spec.grouping.column())
            .y_desc(&spec.y_desc)
            .x_label_formatter(&|x| slot_label(&names, *x))
            .light_line_style(WHITE.mix(0.7))
            .label_style((FONT_FAMILY, FONT_SIZE_LABEL))
            .draw()?;

        chart.draw_series(boxes.iter().map(|(x, stats)| {
            Rectangle::new(
                [(x - BOX_HALF_WIDTH, stats.q1), (x + BOX_HALF_WIDTH, stats.q3)],
                BLACK.stroke_width(2),
            )
        }))?;
        chart.draw_series(
            boxes
                .iter()
                .flat_map(|(x, stats)| stats.whisker_paths(*x))
                .map(|points| PathElement::new(points, BLACK.stroke_width(2))),
        )?;
        chart.draw_series(boxes.iter().map(|(x, stats)| {
            PathElement::new(
                vec![(x - BOX_HALF_WIDTH, stats.median), (x + BOX_HALF_WIDTH, stats.median)],
                MEDIAN_COLOR.stroke_width(2),
            )
        }))?;
        chart.draw_series(boxes.iter().flat_map(|(x, stats)| {
            stats
                .fliers
                .iter()
                .map(move |&val| Circle::new((*x, val), FLIER_RADIUS_PX, BLACK.stroke_width(1)))
        }))?;

        let jitter = Uniform::new_inclusive(-JITTER_HALF_WIDTH, JITTER_HALF_WIDTH)?;
        for ((x, _), group) in boxes.iter().zip(groups) {
            chart.draw_series(group.values.iter().map(|&val| {
                let dx = jitter.sample(rng);
                Circle::new((x + dx, val), POINT_RADIUS_PX, BLUE.mix(0.6).filled())
            }))?;
        }

        chart
            .draw_series(boxes.iter().map(|(x, stats)| {
                TriangleMarker::new((*x, stats.mean), MEAN_MARKER_PX, MEAN_COLOR.filled())
            }))?
            .label("Mean")
            .legend(|(x, y)| TriangleMarker::new((x + 10, y), MEAN_MARKER_PX, MEAN_COLOR.filled()));

        let ref_val = spec.reference.value;
        let x_end = names.len() as f64 - 0.5;
        chart
            .draw_series(LineSeries::new(
                vec![(-0.5, ref_val), (x_end, ref_val)],
                RED.stroke_width(2),
            ))?
            .label(spec.reference.label.as_str())
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font((FONT_FAMILY, FONT_SIZE_LABEL))
            .draw()?;

        root.present()?;
        Ok(())
    }

    fn draw_mae_bar(&self, path: &Path, mae: f64) -> Result<()> {
        let names = ["total MAE"];
        let y_max = if mae > 0.0 { mae * 1.2 } else { 1.0 };

        // Narrow 4:5 figure for a single bar.
        let size = (self.cfg.height * 4 / 5, self.cfg.height);
        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Mean absolute error (MAE) - total", (FONT_FAMILY, FONT_SIZE_TITLE))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(slot_axis(names.len()), 0.0..y_max)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .y_desc("MAE")
            .x_label_formatter(&|x| slot_label(&names, *x))
            .y_label_formatter(&|val| format!("{val:.0}"))
            .light_line_style(WHITE.mix(0.7))
            .label_style((FONT_FAMILY, FONT_SIZE_LABEL))
            .draw()?;

        chart.draw_series(std::iter::once(Rectangle::new(
            [(-BAR_HALF_WIDTH, 0.0), (BAR_HALF_WIDTH, mae)],
            RGBColor(70, 130, 180).filled(),
        )))?;

        chart.draw_series(std::iter::once(Text::new(
            format!("{mae:.2}"),
            (-BAR_HALF_WIDTH / 2.0, mae),
            (FONT_FAMILY, FONT_SIZE_TITLE).into_font(),
        )))?;

        root.present()?;
        Ok(())
    }
}

/// Category axis with one unit-wide slot per category, centred on its index.
fn slot_axis(n_slots: usize) -> WithKeyPoints<RangedCoordf64> {
    let centers = (0..n_slots).map(|idx| idx as f64).collect();
    (-0.5..n_slots as f64 - 0.5).with_key_points(centers)
}

fn slot_label<S: AsRef<str>>(names: &[S], x: f64) -> String {
    let idx = x.round();
    if idx < 0.0 {
        return String::new();
    }
    names
        .get(idx as usize)
        .map(|name| name.as_ref().to_string())
        .unwrap_or_default()
}

/// Padded value-axis range covering every group and the reference line.
fn value_range(groups: &[Group], reference: f64) -> (f64, f64) {
    let (min, max) = groups
        .iter()
        .flat_map(|group| group.values.iter().copied())
        .fold((reference, reference), |(lo, hi), val| (lo.min(val), hi.max(val)));
    padded_range(min, max)
}
