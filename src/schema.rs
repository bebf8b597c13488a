// Static chart-type schema catalog.
//
// The attribute sets below mirror the renderer schema generation named in
// SCHEMA_VERSION. Keeping them as data (instead of reflecting over a
// renderer at runtime) makes validation declarative and testable.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::spec::{is_aggregation_key, is_source_key, TraceSpec};

pub const SCHEMA_VERSION: &str = "plotly-2.27";

/// Trace-level keys valid for every chart type.
const STRUCTURAL_KEYS: &[&str] = &["type", "name", "meta", "transforms", "xaxis", "yaxis"];

/// Types rendered against cartesian x/y axes, which default their axis
/// anchors when the spec leaves them unset.
const CARTESIAN_TYPES: &[&str] = &[
    "scatter", "bar", "box", "violin", "histogram", "heatmap", "contour", "ohlc", "candlestick",
    "waterfall", "funnel",
];

const SCATTER_FIELDS: &[&str] = &[
    "x", "y", "mode", "text", "textposition", "textfont", "hovertext", "hoverinfo",
    "hovertemplate", "marker", "line", "opacity", "fill", "fillcolor", "connectgaps",
    "stackgroup", "orientation", "visible", "showlegend", "legendgroup", "error_x", "error_y",
    "customdata", "ids",
];

const BAR_FIELDS: &[&str] = &[
    "x", "y", "text", "textposition", "hovertext", "hoverinfo", "hovertemplate", "marker",
    "opacity", "orientation", "base", "width", "offset", "visible", "showlegend", "legendgroup",
    "error_x", "error_y", "customdata", "ids",
];

const PIE_FIELDS: &[&str] = &[
    "labels", "values", "text", "textinfo", "textposition", "hovertext", "hoverinfo",
    "hovertemplate", "marker", "opacity", "hole", "pull", "rotation", "direction", "sort",
    "visible", "showlegend", "legendgroup", "domain", "customdata", "ids",
];

const BOX_FIELDS: &[&str] = &[
    "x", "y", "text", "hovertext", "hoverinfo", "marker", "line", "opacity", "orientation",
    "boxpoints", "boxmean", "jitter", "pointpos", "notched", "whiskerwidth", "fillcolor",
    "visible", "showlegend", "legendgroup", "customdata", "ids",
];

const VIOLIN_FIELDS: &[&str] = &[
    "x", "y", "text", "hovertext", "hoverinfo", "marker", "line", "opacity", "orientation",
    "points", "jitter", "pointpos", "bandwidth", "scalemode", "side", "spanmode", "box",
    "meanline", "fillcolor", "visible", "showlegend", "legendgroup",
];

const HISTOGRAM_FIELDS: &[&str] = &[
    "x", "y", "text", "hovertext", "hoverinfo", "hovertemplate", "marker", "opacity",
    "orientation", "histfunc", "histnorm", "nbinsx", "nbinsy", "xbins", "ybins", "cumulative",
    "visible", "showlegend", "legendgroup", "error_x", "error_y",
];

const HEATMAP_FIELDS: &[&str] = &[
    "x", "y", "z", "text", "hovertext", "hoverinfo", "hovertemplate", "opacity", "colorscale",
    "reversescale", "showscale", "zauto", "zmin", "zmax", "zsmooth", "xgap", "ygap", "colorbar",
    "connectgaps", "visible",
];

const CONTOUR_FIELDS: &[&str] = &[
    "x", "y", "z", "text", "hovertext", "hoverinfo", "opacity", "colorscale", "reversescale",
    "showscale", "autocontour", "ncontours", "contours", "zauto", "zmin", "zmax", "line",
    "colorbar", "connectgaps", "visible",
];

const OHLC_FIELDS: &[&str] = &[
    "x", "open", "high", "low", "close", "text", "hoverinfo", "opacity", "line", "increasing",
    "decreasing", "tickwidth", "visible", "showlegend", "legendgroup",
];

const CANDLESTICK_FIELDS: &[&str] = &[
    "x", "open", "high", "low", "close", "text", "hoverinfo", "opacity", "line", "increasing",
    "decreasing", "whiskerwidth", "visible", "showlegend", "legendgroup",
];

const WATERFALL_FIELDS: &[&str] = &[
    "x", "y", "text", "textposition", "hovertext", "hoverinfo", "hovertemplate", "opacity",
    "orientation", "measure", "base", "increasing", "decreasing", "totals", "connector",
    "visible", "showlegend", "legendgroup",
];

const FUNNEL_FIELDS: &[&str] = &[
    "x", "y", "text", "textposition", "textinfo", "hovertext", "hoverinfo", "hovertemplate",
    "marker", "opacity", "orientation", "connector", "visible", "showlegend", "legendgroup",
];

const INDICATOR_FIELDS: &[&str] = &[
    "value", "mode", "title", "number", "delta", "gauge", "align", "domain", "visible",
];

const CHOROPLETH_FIELDS: &[&str] = &[
    "locations", "z", "locationmode", "geojson", "featureidkey", "text", "hovertext",
    "hoverinfo", "hovertemplate", "colorscale", "reversescale", "showscale", "zauto", "zmin",
    "zmax", "marker", "colorbar", "visible", "showlegend", "legendgroup", "geo",
];

const SCATTERGEO_FIELDS: &[&str] = &[
    "lon", "lat", "locations", "locationmode", "geojson", "featureidkey", "mode", "text",
    "textposition", "hovertext", "hoverinfo", "hovertemplate", "marker", "line", "opacity",
    "fill", "fillcolor", "connectgaps", "visible", "showlegend", "legendgroup", "geo",
];

const SCATTERMAPBOX_FIELDS: &[&str] = &[
    "lon", "lat", "mode", "text", "textposition", "hovertext", "hoverinfo", "hovertemplate",
    "marker", "line", "opacity", "fill", "fillcolor", "connectgaps", "below", "visible",
    "showlegend", "legendgroup", "subplot",
];

const DENSITYMAPBOX_FIELDS: &[&str] = &[
    "lon", "lat", "z", "radius", "text", "hovertext", "hoverinfo", "hovertemplate",
    "colorscale", "reversescale", "showscale", "zauto", "zmin", "zmax", "opacity", "below",
    "colorbar", "visible", "showlegend", "legendgroup", "subplot",
];

const CHOROPLETHMAPBOX_FIELDS: &[&str] = &[
    "locations", "z", "geojson", "featureidkey", "text", "hovertext", "hoverinfo",
    "hovertemplate", "colorscale", "reversescale", "showscale", "zauto", "zmin", "zmax",
    "marker", "below", "colorbar", "visible", "showlegend", "legendgroup", "subplot",
];

const SUNBURST_FIELDS: &[&str] = &[
    "labels", "parents", "values", "ids", "text", "textinfo", "hovertext", "hoverinfo",
    "hovertemplate", "marker", "opacity", "branchvalues", "count", "maxdepth", "level", "sort",
    "rotation", "domain", "visible",
];

const TREEMAP_FIELDS: &[&str] = &[
    "labels", "parents", "values", "ids", "text", "textinfo", "hovertext", "hoverinfo",
    "hovertemplate", "marker", "opacity", "branchvalues", "count", "maxdepth", "level", "sort",
    "pathbar", "tiling", "domain", "visible",
];

const LAYOUT_KEYS: &[&str] = &[
    "title", "showlegend", "legend", "margin", "autosize", "width", "height", "font",
    "paper_bgcolor", "plot_bgcolor", "colorway", "hovermode", "hoverlabel", "hoverdistance",
    "spikedistance", "dragmode", "clickmode", "selectdirection", "grid", "annotations",
    "shapes", "images", "sliders", "updatemenus", "barmode", "barnorm", "bargap",
    "bargroupgap", "boxmode", "boxgap", "boxgroupgap", "violinmode", "violingap",
    "violingroupgap", "waterfallmode", "waterfallgap", "funnelmode", "funnelgap", "polar",
    "geo", "mapbox", "calendar", "separators", "transition", "template", "uirevision",
    "modebar", "datarevision",
];

pub struct SchemaCatalog {
    fields: HashMap<&'static str, &'static [&'static str]>,
}

static CATALOG: OnceLock<SchemaCatalog> = OnceLock::new();

impl SchemaCatalog {
    pub fn global() -> &'static SchemaCatalog {
        CATALOG.get_or_init(SchemaCatalog::build)
    }

    fn build() -> SchemaCatalog {
        let mut fields: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        fields.insert("scatter", SCATTER_FIELDS);
        fields.insert("bar", BAR_FIELDS);
        fields.insert("pie", PIE_FIELDS);
        fields.insert("box", BOX_FIELDS);
        fields.insert("violin", VIOLIN_FIELDS);
        fields.insert("histogram", HISTOGRAM_FIELDS);
        fields.insert("heatmap", HEATMAP_FIELDS);
        fields.insert("contour", CONTOUR_FIELDS);
        fields.insert("ohlc", OHLC_FIELDS);
        fields.insert("candlestick", CANDLESTICK_FIELDS);
        fields.insert("waterfall", WATERFALL_FIELDS);
        fields.insert("funnel", FUNNEL_FIELDS);
        fields.insert("indicator", INDICATOR_FIELDS);
        fields.insert("choropleth", CHOROPLETH_FIELDS);
        fields.insert("scattergeo", SCATTERGEO_FIELDS);
        fields.insert("scattermapbox", SCATTERMAPBOX_FIELDS);
        fields.insert("densitymapbox", DENSITYMAPBOX_FIELDS);
        fields.insert("choroplethmapbox", CHOROPLETHMAPBOX_FIELDS);
        fields.insert("sunburst", SUNBURST_FIELDS);
        fields.insert("treemap", TREEMAP_FIELDS);
        SchemaCatalog { fields }
    }

    /// Ordered attribute set for a chart type, None for unsupported types.
    pub fn fields(&self, chart_type: &str) -> Option<&'static [&'static str]> {
        self.fields.get(chart_type).copied()
    }

    pub fn supports(&self, chart_type: &str) -> bool {
        self.fields.contains_key(chart_type)
    }

    pub fn has_field(&self, chart_type: &str, field: &str) -> bool {
        self.fields(chart_type).map_or(false, |fs| fs.contains(&field))
    }

    pub fn has_axes(&self, chart_type: &str) -> bool {
        CARTESIAN_TYPES.contains(&chart_type)
    }

    /// Whether a trace-level key survives validation for this chart type:
    /// catalog attributes, structural keys, source references and scalar
    /// aggregation directives all pass.
    pub fn allows(&self, chart_type: &str, key: &str) -> bool {
        if is_source_key(key) || is_aggregation_key(key) {
            return true;
        }
        if STRUCTURAL_KEYS.contains(&key) {
            return true;
        }
        self.has_field(chart_type, key)
    }

    /// The (x, y) source keys feeding a trace's pipeline. Several chart
    /// families rename their primary data fields.
    pub fn primary_sources(&self, trace: &TraceSpec) -> (&'static str, &'static str) {
        match trace.chart_type() {
            "pie" => ("labelssrc", "valuessrc"),
            "choropleth" | "choroplethmapbox" => ("locationssrc", "zsrc"),
            "scattergeo" => {
                if trace.get("latsrc").is_some() {
                    ("latsrc", "zsrc")
                } else {
                    ("locationssrc", "zsrc")
                }
            }
            "scattermapbox" | "densitymapbox" => ("latsrc", "zsrc"),
            _ => ("xsrc", "ysrc"),
        }
    }

    /// Container attributes whose flat spec keys fold into a nested object
    /// ("deltareference" becomes delta.reference).
    pub fn nested_containers(&self, chart_type: &str) -> &'static [&'static str] {
        match chart_type {
            "indicator" => &["delta", "gauge"],
            _ => &[],
        }
    }

    pub fn layout_allows(&self, key: &str) -> bool {
        LAYOUT_KEYS.contains(&key) || is_axis_key(key)
    }
}

/// "xaxis", "yaxis2", "xaxis10" and so on.
pub fn is_axis_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix('x').or_else(|| key.strip_prefix('y')) else {
        return false;
    };
    let Some(digits) = rest.strip_prefix("axis") else {
        return false;
    };
    digits.is_empty() || digits.chars().all(|c| c.is_ascii_digit())
}

/// Layout key addressed by an axis reference like "y2" or "x".
pub fn axis_ref_to_key(reference: &str) -> Option<String> {
    let mut chars = reference.chars();
    let axis = chars.next()?;
    if axis != 'x' && axis != 'y' {
        return None;
    }
    let rest = chars.as_str();
    if !rest.is_empty() && !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}axis{}", axis, rest))
}
