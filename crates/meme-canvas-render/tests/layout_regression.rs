use meme_canvas_render::{
    wrap_text, CanvasConfig, ClientPoint, CompositionSession, DisplayRect, DragTarget, DrawCommand,
    FontSpec, GuideAxis, HeuristicMeasurer, ImageSize, InteractionConfig, LayoutEngine, MemeFrame,
    MemeState, MemeStyle, TextBaseline, TextCommand, TextMeasurer,
};

const LONG_CAPTION: &str =
    "when the build finally passes but you have no idea which of your forty changes fixed it";

fn texts(frame: &MemeFrame) -> Vec<&TextCommand> {
    frame.text_commands().collect()
}

#[test]
fn wrapped_lines_fit_or_hold_a_single_word() {
    let font = FontSpec::new("Impact, sans-serif", 900, 48.0);
    let lines = wrap_text(LONG_CAPTION, 720.0, &font, &HeuristicMeasurer);
    assert!(lines.len() > 1, "caption should wrap: {:?}", lines);
    for line in &lines {
        let fits = HeuristicMeasurer.measure_text_px(line, &font) < 720.0;
        assert!(fits || !line.contains(' '), "overflowing line {:?}", line);
    }
    let rejoined = lines.join(" ");
    assert_eq!(rejoined, LONG_CAPTION.to_uppercase());
}

#[test]
fn classic_bottom_caption_grows_upward_from_anchor() {
    let state = MemeState {
        bottom_text: LONG_CAPTION.to_string(),
        top_text: String::new(),
        ..MemeState::default()
    };
    let frame = LayoutEngine::default().compose(ImageSize::new(800, 600), &state, None);
    let lines = texts(&frame);
    assert!(lines.len() > 1);
    assert!(lines.iter().all(|t| t.baseline == TextBaseline::Bottom));
    assert!(lines.windows(2).all(|w| w[0].y < w[1].y));
    assert_eq!(lines.last().map(|t| t.y), Some(570));
}

#[test]
fn poster_top_caption_clears_a_tall_bottom_block() {
    let engine = LayoutEngine::default();
    let image = ImageSize::new(800, 600);

    let short = MemeState {
        style: MemeStyle::Demotivational,
        ..MemeState::default()
    };
    let frame = engine.compose(image, &short, None);
    assert_eq!((frame.width, frame.height), (900, 850));
    let top = texts(&frame)
        .into_iter()
        .find(|t| t.text == "ENTER TOP TEXT")
        .map(|t| t.y);
    assert_eq!(top, Some(720));

    let tall = MemeState {
        style: MemeStyle::Demotivational,
        bottom_text: LONG_CAPTION.to_string(),
        ..MemeState::default()
    };
    let frame = engine.compose(image, &tall, None);
    let bottom_size = 48.0 * 0.6;
    let lines = texts(&frame);
    let bottom_last = lines
        .iter()
        .filter(|t| t.font.size_px == bottom_size)
        .map(|t| t.y)
        .max()
        .expect("bottom caption");
    let top_first = lines
        .iter()
        .filter(|t| t.font.size_px == 48.0)
        .map(|t| t.y)
        .min()
        .expect("top caption");
    assert!(top_first as f32 >= bottom_last as f32 + bottom_size + 10.0 - 1.0);
}

#[test]
fn config_deserializes_with_defaults_for_missing_fields() {
    let cfg: CanvasConfig =
        serde_json::from_str(r#"{"reference_width": 400.0, "guide_dash_on": 8}"#)
            .expect("parse config");
    assert_eq!(cfg.reference_width, 400.0);
    assert_eq!(cfg.guide_dash_on, 8);
    assert_eq!(cfg.poster_band_px, CanvasConfig::default().poster_band_px);

    let json = serde_json::to_string(&cfg).expect("serialize config");
    let back: CanvasConfig = serde_json::from_str(&json).expect("reparse config");
    assert_eq!(back, cfg);

    let frame =
        LayoutEngine::new(cfg).compose(ImageSize::new(800, 600), &MemeState::default(), None);
    assert_eq!((frame.width, frame.height), (400, 300));
}

#[test]
fn caption_drag_shows_guides_until_release() {
    let mut session = CompositionSession::new(
        LayoutEngine::default(),
        InteractionConfig::default(),
        MemeState::with_image("memes/cat.png"),
    );
    let request = session.take_load_request().expect("load queued");
    assert!(session.complete_load::<&str>(request.ticket, Ok(ImageSize::new(1600, 1200))));

    // Canvas is 800x600, shown at half size.
    let display = DisplayRect::new(100.0, 50.0, 400.0, 300.0);
    assert_eq!(
        session.pointer_down(ClientPoint::new(300.0, 60.0), display),
        Some(DragTarget::Top)
    );
    let patch = session
        .pointer_move(ClientPoint::new(301.0, 125.0), display)
        .expect("drag update");
    assert_eq!(patch.top_x, Some(50.0));
    assert_eq!(patch.top_offset, Some(25.0));

    let frame = session.frame().expect("frame");
    let guides: Vec<_> = frame
        .overlay_commands
        .iter()
        .filter_map(|cmd| match cmd {
            DrawCommand::Guide(guide) => Some(guide),
            _ => None,
        })
        .collect();
    assert_eq!(guides.len(), 1);
    assert_eq!(guides[0].axis, GuideAxis::Vertical);
    assert_eq!(guides[0].position, 400);

    let committed = session.pointer_up().expect("commit");
    assert_eq!(committed.top_x, Some(50.0));
    assert_eq!(committed.top_offset, 25.0);
    let frame = session.frame().expect("frame");
    assert!(frame.overlay_commands.is_empty());
}
