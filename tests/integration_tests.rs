//! Integration tests using test data fixtures
//!
//! Each file in testdata/ holds rendered SVG and, after a `---` line, the
//! expected summary of what the decoration pipeline made of it.
//! Run all tests with: cargo test

use m2anim::label::{resolve_edge_label, resolve_node_label};
use m2anim::{
    DiagramInstance, EventHandlers, ExportFormat, Exporter, FetchError, FrameRequest,
    InstanceOptions, NodeEvent, PointerEvent, RenderError, StyleSheet, ThemeOverride,
};
use m2anim::export::{
    graphic_size, inline_clone, raster_svg, FetchChain, EXPORT_STYLE_CLASS, TRANSPARENT_PIXEL_URI,
};
use resvg::usvg;
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

type Engine = Box<dyn Fn(&str) -> Result<String, RenderError>>;

/// Get the path to the test data directory
fn get_testdata_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

/// Parse a test file into (input, expected_output)
fn parse_test_file(content: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = content.splitn(2, "\n---\n").collect();
    if parts.len() != 2 {
        return None;
    }
    Some((parts[0].to_string(), parts[1].trim_end().to_string()))
}

/// Normalize output for comparison (trim trailing whitespace from each line)
fn normalize_output(s: &str) -> String {
    s.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

fn load_fixture(test_name: &str) -> (String, String) {
    let test_file = get_testdata_dir().join(format!("{}.txt", test_name));
    let content = fs::read_to_string(&test_file)
        .unwrap_or_else(|e| panic!("Failed to read {:?}: {}", test_file, e));
    parse_test_file(&content)
        .unwrap_or_else(|| panic!("Failed to parse test file: {:?}", test_file))
}

/// Layout engine that always answers with the fixture's SVG.
fn fixture_engine(svg: String) -> Engine {
    Box::new(move |_: &str| -> Result<String, RenderError> { Ok(svg.clone()) })
}

fn offline(url: &str) -> Result<Vec<u8>, FetchError> {
    Err(FetchError::Http {
        url: url.to_string(),
        reason: "offline".to_string(),
    })
}

fn offline_exporter() -> Exporter {
    Exporter::new(&Default::default(), FetchChain::new(offline))
}

fn render_fixture(test_name: &str, source: &str, options: InstanceOptions) -> DiagramInstance<Engine> {
    let (svg, _) = load_fixture(test_name);
    let mut diagram = DiagramInstance::new(fixture_engine(svg), options);
    diagram
        .render(source, 0.0)
        .unwrap_or_else(|e| panic!("Failed to render: {}", e));
    diagram
}

/// Human-readable digest of a decorated diagram.
fn summarize(diagram: &DiagramInstance<Engine>) -> String {
    let doc = diagram.document().unwrap();
    let c = diagram.classification().unwrap();

    let markers = c
        .markers
        .iter()
        .map(|m| format!("{} refX={}", doc.attr(*m, "id").unwrap_or("?"), doc.attr(*m, "refX").unwrap_or("?")))
        .collect::<Vec<_>>()
        .join(", ");
    let node_labels = c
        .node_containers(doc)
        .into_iter()
        .map(|n| resolve_node_label(doc, n).unwrap_or_else(|| "-".to_string()))
        .collect::<Vec<_>>();
    let edge_labels = c
        .edges
        .iter()
        .map(|e| resolve_edge_label(doc, c, *e).unwrap_or_else(|| "-".to_string()))
        .collect::<Vec<_>>();
    let durations = diagram
        .particles()
        .map(|p| {
            p.timeline()
                .windows
                .iter()
                .map(|w| w.duration.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    let list = |items: Vec<String>| {
        if items.is_empty() {
            "(none)".to_string()
        } else {
            items.join(" | ")
        }
    };

    [
        format!("family: {}", c.edge_family),
        format!("nodes: {}", c.node_containers(doc).len()),
        format!("edges: {}", c.edges.len()),
        format!("markers: {}", markers),
        format!("node labels: {}", list(node_labels)),
        format!("edge labels: {}", list(edge_labels)),
        format!("durations: {}", durations),
    ]
    .join("\n")
}

/// Run a fixture and compare its summary
fn run_fixture_test(test_name: &str) {
    let (input, expected) = load_fixture(test_name);
    let diagram = render_fixture(test_name, "", InstanceOptions::default());
    let actual = summarize(&diagram);

    let expected_normalized = normalize_output(&expected);
    let actual_normalized = normalize_output(&actual);

    if expected_normalized != actual_normalized {
        eprintln!("=== Test: {} ===", test_name);
        eprintln!("Input:\n{}", input);
        eprintln!("\n--- Expected ---");
        eprintln!("{}", expected_normalized);
        eprintln!("\n--- Actual ---");
        eprintln!("{}", actual_normalized);
        eprintln!("\n--- Diff ---");

        let expected_lines: Vec<_> = expected_normalized.lines().collect();
        let actual_lines: Vec<_> = actual_normalized.lines().collect();
        let max_lines = expected_lines.len().max(actual_lines.len());

        for i in 0..max_lines {
            let exp = expected_lines.get(i).unwrap_or(&"<missing>");
            let act = actual_lines.get(i).unwrap_or(&"<missing>");
            if exp != act {
                eprintln!("Line {}: expected {:?}", i + 1, exp);
                eprintln!("Line {}: actual   {:?}", i + 1, act);
            }
        }

        panic!("Output mismatch for test: {}", test_name);
    }
}

/// Exported SVG must parse on its own and carry exactly the live elements
/// plus one embedded style block.
fn run_export_test(test_name: &str) {
    let diagram = render_fixture(test_name, "", InstanceOptions::default());
    let rules = vec![".page a { color: red; }".to_string(), ".page b { color: blue; }".to_string()];
    let exporter = offline_exporter().with_styles(vec![
        StyleSheet::Rules(rules.clone()),
        StyleSheet::CrossOrigin {
            href: "https://cdn.example/site.css".to_string(),
        },
    ]);

    let bytes = diagram.export_bytes(&exporter, ExportFormat::Svg).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let parsed = roxmltree::Document::parse(&text)
        .unwrap_or_else(|e| panic!("Exported SVG for {} does not parse: {}", test_name, e));

    let live = diagram.document().unwrap();
    let exported_elements = parsed.descendants().filter(|n| n.is_element()).count();
    assert_eq!(exported_elements, live.element_count(live.root()) + 1);

    let style = parsed
        .root_element()
        .first_element_child()
        .expect("export style block");
    assert_eq!(style.tag_name().name(), "style");
    assert_eq!(style.attribute("class"), Some(EXPORT_STYLE_CLASS));
    assert_eq!(style.text().unwrap_or("").lines().count(), rules.len());

    assert_eq!(
        live.instance_id(),
        diagram.document().unwrap().instance_id(),
        "export must not replace the live graphic"
    );
}

/// Classifying an already decorated graphic changes nothing.
fn run_idempotence_test(test_name: &str) {
    let diagram = render_fixture(test_name, "", InstanceOptions::default());
    let mut doc = diagram.document().unwrap().clone();
    let before = doc.to_svg_string();
    let again = m2anim::Classifier::new().classify(&mut doc);
    assert_eq!(&again, diagram.classification().unwrap());
    assert_eq!(doc.to_svg_string(), before);
}

/// Macro to generate fixture test functions
macro_rules! fixture_test {
    ($name:ident) => {
        #[test]
        fn $name() {
            run_fixture_test(stringify!($name));
        }

        paste::paste! {
            #[test]
            fn [<export_ $name>]() {
                run_export_test(stringify!($name));
            }

            #[test]
            fn [<reclassify_ $name>]() {
                run_idempotence_test(stringify!($name));
            }
        }
    };
}

// =============================================================================
// Fixtures
// =============================================================================

fixture_test!(flowchart);
fixture_test!(sequence);
fixture_test!(class);
fixture_test!(er_fallback);

// =============================================================================
// Scenarios
// =============================================================================

const SEQUENCE_SOURCE: &str = "sequenceDiagram\n    participant img:https://img.example/a.png A\n    participant B\n    A->>B: hi\n";

#[test]
fn actor_image_attached_to_both_boxes_of_mapped_actor() {
    let seen = Rc::new(RefCell::new(String::new()));
    let sink = seen.clone();
    let (svg, _) = load_fixture("sequence");
    let engine: Engine = Box::new(move |source: &str| -> Result<String, RenderError> {
        *sink.borrow_mut() = source.to_string();
        Ok(svg.clone())
    });
    let mut diagram = DiagramInstance::new(engine, InstanceOptions::default());
    diagram.render(SEQUENCE_SOURCE, 0.0).unwrap();

    assert!(!seen.borrow().contains("img:"));
    assert!(seen.borrow().contains("participant A\n"));

    let doc = diagram.document().unwrap();
    let root = doc.root();
    let images: Vec<_> = doc
        .descendants(root)
        .into_iter()
        .filter(|n| doc.name(*n) == "image")
        .collect();
    // A is drawn twice, above and below its lifeline; B has no mapping.
    assert_eq!(images.len(), 2);
    for image in &images {
        assert_eq!(doc.attr(*image, "href"), Some("https://img.example/a.png"));
        assert_eq!(doc.attr(*image, "x"), Some("8"));
    }
    assert_eq!(doc.attr(images[0], "y"), Some("8.5"));
    assert_eq!(doc.attr(images[1], "y"), Some("128.5"));
    assert_eq!(doc.attr(doc.parent(images[0]).unwrap(), "id"), Some("root-0"));
    let bottom = doc.parent(images[1]).unwrap();
    let bottom_rect = doc.find_first(bottom, "rect").unwrap();
    assert!(doc.has_class(bottom_rect, "actor-bottom"));

    let tspans: Vec<_> = doc
        .descendants(root)
        .into_iter()
        .filter(|n| doc.name(*n) == "tspan")
        .map(|n| doc.attr(n, "x").unwrap_or("?"))
        .collect();
    assert_eq!(tspans, vec!["103", "275", "103", "275"]);

    let exported = String::from_utf8(diagram.export_bytes(&offline_exporter(), ExportFormat::Svg).unwrap()).unwrap();
    assert!(exported.contains(TRANSPARENT_PIXEL_URI));
    assert!(!exported.contains("https://img.example/a.png"));
}

#[test]
fn node_click_reports_label_and_box() {
    let clicks: Rc<RefCell<Vec<NodeEvent>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = clicks.clone();
    let (svg, _) = load_fixture("flowchart");
    let mut diagram = DiagramInstance::new(fixture_engine(svg), InstanceOptions::default())
        .with_handlers(EventHandlers::new().on_node_click(move |e| sink.borrow_mut().push(e)));
    diagram.render("flowchart TD\n  A[Start Process] --> B{Check}", 0.0).unwrap();

    let doc = diagram.document().unwrap();
    let rect = diagram.classification().unwrap().nodes[0];
    let span = doc.find_first(doc.parent(rect).unwrap(), "span").unwrap();
    assert!(diagram.dispatch(PointerEvent::click(span)));

    let clicks = clicks.borrow();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].label.as_deref(), Some("Start Process"));
    let bbox = clicks[0].bbox.unwrap();
    assert_eq!((bbox.x, bbox.y, bbox.width, bbox.height), (30.0, 0.0, 124.0, 34.0));
}

#[test]
fn particles_take_turns_across_edges() {
    let mut diagram = render_fixture("flowchart", "", InstanceOptions::default());
    let core_opacity = |diagram: &DiagramInstance<Engine>, i: usize| -> f64 {
        let doc = diagram.document().unwrap();
        let record = &diagram.particles().unwrap().records()[i];
        doc.attr_f64(record.core, "opacity").unwrap_or(0.0)
    };

    assert_eq!(diagram.tick(1_000.0), FrameRequest::Continue);
    assert!(core_opacity(&diagram, 0) > 0.0);
    assert_eq!(core_opacity(&diagram, 1), 0.0);

    diagram.tick(3_000.0);
    assert_eq!(core_opacity(&diagram, 0), 0.0);
    assert!(core_opacity(&diagram, 1) > 0.0);

    // 4250 ms loop: wraps back to the first edge.
    diagram.tick(5_250.0);
    assert!(core_opacity(&diagram, 0) > 0.0);
    assert_eq!(core_opacity(&diagram, 1), 0.0);
}

#[test]
fn disable_animations_keeps_classification() {
    let mut diagram = render_fixture("flowchart", "", InstanceOptions::default());
    diagram.tick(1_000.0);
    diagram.set_animations_enabled(false, 1_100.0);

    let frozen = diagram.document().unwrap().to_svg_string();
    // Only the circleEnd marker's circle is left.
    assert_eq!(frozen.matches("<circle").count(), 1);
    assert_eq!(diagram.tick(2_000.0), FrameRequest::Stop);
    assert_eq!(diagram.document().unwrap().to_svg_string(), frozen);

    let doc = diagram.document().unwrap();
    let c = diagram.classification().unwrap();
    assert_eq!(c.edges.len(), 2);
    for edge in &c.edges {
        assert!(doc.has_class(*edge, m2anim::classify::EDGE_CLASS));
        assert!(!doc.has_class(*edge, m2anim::theme::EDGE_FLOW_CLASS));
    }
}

#[test]
fn failed_rerender_keeps_working_diagram() {
    let (svg, _) = load_fixture("flowchart");
    let engine: Engine = Box::new(move |source: &str| -> Result<String, RenderError> {
        if source.contains("-->>") {
            Err(RenderError::Layout("Parse error on line 2".to_string()))
        } else {
            Ok(svg.clone())
        }
    });
    let mut diagram = DiagramInstance::new(engine, InstanceOptions::default());
    diagram.render("flowchart TD\n  A --> B", 0.0).unwrap();
    let id = diagram.document().unwrap().instance_id();

    assert!(diagram.render("flowchart TD\n  A -->> B", 100.0).is_err());
    assert_eq!(diagram.document().unwrap().instance_id(), id);
    assert_eq!(diagram.tick(500.0), FrameRequest::Continue);
}

#[test]
fn raster_keeps_html_labels_as_text() {
    let diagram = render_fixture("flowchart", "", InstanceOptions::default());
    let live = diagram.document().unwrap();
    let inlined = inline_clone(live, &[], &FetchChain::new(offline));
    let svg = raster_svg(&inlined, graphic_size(&inlined).unwrap());
    assert!(!svg.contains("foreignObject"));

    let parsed = roxmltree::Document::parse(&svg).unwrap();
    let texts: Vec<String> = parsed
        .descendants()
        .filter(|n| n.has_tag_name("text"))
        .map(|n| n.descendants().filter(|d| d.is_text()).filter_map(|d| d.text()).collect::<String>())
        .collect();
    for label in ["Start Process", "Check", "Done", "yes", "no"] {
        assert!(texts.iter().any(|t| t == label), "missing {label:?} in {texts:?}");
    }

    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let has_fonts = !options.fontdb.is_empty();
    let tree = usvg::Tree::from_str(&svg, &options).unwrap();
    fn count_text(group: &usvg::Group) -> usize {
        group
            .children()
            .iter()
            .map(|node| match node {
                usvg::Node::Text(_) => 1,
                usvg::Node::Group(g) => count_text(g),
                _ => 0,
            })
            .sum()
    }
    // Without any installed font usvg drops text it cannot shape.
    if has_fonts {
        assert_eq!(count_text(tree.root()), 5);
    }
}

#[test]
fn jpg_export_always_has_white_background() {
    let diagram = render_fixture(
        "class",
        "",
        InstanceOptions {
            theme: Some(ThemeOverride {
                background: Some("transparent".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    let bytes = diagram
        .export_bytes(&offline_exporter().with_background("transparent"), ExportFormat::Jpg)
        .unwrap();
    let img = image::load_from_memory(&bytes).unwrap().to_rgb8();
    // 120x230 view box, 100px padding on each side, 2x supersampled.
    assert_eq!(img.dimensions(), (640, 860));
    let [r, g, b] = img.get_pixel(2, 2).0;
    assert!(r > 245 && g > 245 && b > 245, "corner = {r},{g},{b}");
}

#[test]
fn png_export_honors_transparent_background() {
    let diagram = render_fixture("er_fallback", "", InstanceOptions::default());
    let bytes = diagram
        .export_bytes(&offline_exporter().with_background("transparent"), ExportFormat::Png)
        .unwrap();
    let img = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (1000, 600));
    assert_eq!(img.get_pixel(0, 0).0[3], 0);
}

#[test]
fn enhance_svg_places_particles() {
    let (svg, _) = load_fixture("sequence");
    let out = m2anim::enhance_svg(&svg, &InstanceOptions::default(), 1_462.5).unwrap();
    let doc = roxmltree::Document::parse(&out).unwrap();
    let core = doc
        .descendants()
        .find(|n| n.attribute("class") == Some("flow-particle"))
        .expect("particle core");
    // Halfway through the only window: eased position is the midpoint.
    assert_eq!(core.attribute("cx"), Some("173.50"));
    assert_eq!(core.attribute("cy"), Some("111.00"));
}
