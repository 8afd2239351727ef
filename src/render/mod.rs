//! Widget render pipeline: rows in, KPI/table/chart visuals out.

mod host;
mod palette;
mod pipeline;
mod visual;

pub use host::{ChartHost, HeadlessHost, InstanceId};
pub use palette::Palette;
pub use pipeline::{RenderOutcome, RenderPipeline, RenderTicket};
pub use visual::{
    ChartVisual, KpiVisual, PieVisual, Series, TableVisual, Visual, as_number, build_visual,
    columns_of,
};
