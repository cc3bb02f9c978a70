use attendance_extract::{
    AttendanceExtractor, AttendanceExtractorBuilder, ClassType, CourseNames, EntryFlag, Error,
    Extraction, ExtractionOptions, NamePolicy, PrecomputedTokens, Token, TokenPage, UNKNOWN_COURSE,
};
use image::DynamicImage;

const WIDTH: u32 = 2000;

// Column centers inside the left table (split at 0.52 of a 2000px image).
const CODE_X: f32 = 120.0;
const TYPE_X: f32 = 440.0;
const ATTENDANCE_X: f32 = 650.0;
const PERCENT_X: f32 = 900.0;
// Right table.
const DICT_CODE_X: f32 = 1150.0;
const DICT_NAME_X: f32 = 1600.0;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn extractor() -> AttendanceExtractor {
    AttendanceExtractorBuilder::new()
        .build()
        .expect("Failed to build extractor")
}

fn page(tokens: Vec<Token>) -> TokenPage {
    TokenPage {
        width: WIDTH,
        height: 1200,
        tokens,
    }
}

fn token(text: &str, x: f32, y: f32) -> Token {
    Token::new(text, x, y, 0.9)
}

fn load_fixture() -> TokenPage {
    let json = std::fs::read_to_string("tests/data/portal_tokens.json")
        .expect("Failed to read token fixture");
    serde_json::from_str(&json).expect("Malformed token fixture")
}

#[test]
fn single_row_round_trip() {
    init();
    let extraction = extractor().extract(&page(vec![
        token("CSUC201", CODE_X, 200.0),
        token("LECT", TYPE_X, 200.0),
        token("42/59", ATTENDANCE_X, 200.0),
        token("71.2%", PERCENT_X, 200.0),
        token("CSUC201", DICT_CODE_X, 200.0),
        token("FUNDAMENTALS OF DATA STRUCTURE AND ALGORITHMS", DICT_NAME_X, 200.0),
    ]));

    assert_eq!(extraction.entries.len(), 1);
    let entry = &extraction.entries[0];
    assert_eq!(entry.course_code, "CSUC201");
    assert_eq!(entry.course_name, "FUNDAMENTALS OF DATA STRUCTURE AND ALGORITHMS");
    assert_eq!(entry.class_type, ClassType::Lect);
    assert_eq!((entry.present, entry.total), (42, 59));
    assert_eq!(entry.percentage, 71.2);
    assert!((entry.confidence - 0.9).abs() < 1e-6);
    assert!(!entry.is_flagged());
}

#[test]
fn fields_attach_to_nearest_anchor() {
    init();
    let extraction = extractor().extract(&page(vec![
        token("CSUC201", CODE_X, 200.0),
        token("LECT", TYPE_X, 200.0),
        token("CSUC201", CODE_X, 250.0),
        token("LAB", TYPE_X, 250.0),
        token("38/52", ATTENDANCE_X, 252.0),
        token("42/59", ATTENDANCE_X, 203.0),
    ]));

    let [lect, lab] = &extraction.entries[..] else {
        panic!("expected two entries, got {:?}", extraction.entries);
    };
    assert_eq!((lect.class_type, lect.present, lect.total), (ClassType::Lect, 42, 59));
    assert_eq!((lab.class_type, lab.present, lab.total), (ClassType::Lab, 38, 52));
}

#[test]
fn code_without_class_type_yields_nothing() {
    init();
    let extraction = extractor().extract(&page(vec![
        token("CSUC201", CODE_X, 200.0),
        token("42/59", ATTENDANCE_X, 200.0),
        token("71.2%", PERCENT_X, 200.0),
        token("LECT", TYPE_X, 240.0),
    ]));
    assert!(extraction.entries.is_empty());
    assert_eq!(extraction.diagnostics.anchors, 0);
    assert_eq!(extraction.diagnostics.attendance_fields, 1);
}

#[test]
fn empty_duplicate_loses_to_filled_one() {
    init();
    let extraction = extractor().extract(&page(vec![
        token("CSUC201", CODE_X, 200.0),
        token("LECT", TYPE_X, 200.0),
        token("42/59", ATTENDANCE_X, 200.0),
        token("CSUC201", CODE_X, 400.0),
        token("LECT", TYPE_X, 400.0),
        token("0/0", ATTENDANCE_X, 400.0),
    ]));
    assert_eq!(extraction.entries.len(), 1);
    assert_eq!(extraction.entries[0].total, 59);
    assert_eq!(extraction.diagnostics.duplicates_merged, 1);
}

#[test]
fn present_above_total_is_kept_and_flagged() {
    init();
    let extraction = extractor().extract(&page(vec![
        token("PHYS102", CODE_X, 200.0),
        token("LAB", TYPE_X, 200.0),
        token("50/40", ATTENDANCE_X, 200.0),
        token("125%", PERCENT_X, 200.0),
    ]));
    assert_eq!(extraction.entries.len(), 1);
    let entry = &extraction.entries[0];
    assert_eq!((entry.present, entry.total), (50, 40));
    assert!(!entry.is_valid());
    assert_eq!(
        entry.flags,
        vec![EntryFlag::PresentExceedsTotal, EntryFlag::UnknownCourse]
    );
}

#[test]
fn fixture_page_reconstructs_every_row() {
    init();
    let extraction = extractor().extract(&load_fixture());
    let Extraction {
        entries,
        diagnostics,
    } = extraction;

    let rows = entries
        .iter()
        .map(|it| {
            (
                it.course_code.as_str(),
                it.class_type,
                it.present,
                it.total,
                it.percentage,
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        rows,
        vec![
            ("CSUC201", ClassType::Lect, 42, 59, 71.2),
            ("CSUC201", ClassType::Lab, 38, 52, 73.1),
            ("MATH101", ClassType::Lect, 50, 60, 83.3),
            ("PHYS102", ClassType::Lab, 50, 40, 100.0),
        ]
    );

    assert_eq!(entries[0].course_name, "FUNDAMENTALS OF DATA STRUCTURE AND ALGORITHMS");
    assert_eq!(entries[1].course_name, "FUNDAMENTALS OF DATA STRUCTURE AND ALGORITHMS");
    assert_eq!(entries[2].course_name, "ENGINEERING MATHEMATICS");
    assert_eq!(entries[3].course_name, UNKNOWN_COURSE);
    assert!(entries[..3].iter().all(|it| !it.is_flagged()));
    assert_eq!(
        entries[3].flags,
        vec![
            EntryFlag::PresentExceedsTotal,
            EntryFlag::PercentageMismatch {
                reported: 100.0,
                expected: 125.0
            },
            EntryFlag::UnknownCourse,
        ]
    );
    assert!(entries
        .iter()
        .all(|it| (0.0..=1.0).contains(&it.confidence)));

    assert_eq!(diagnostics.image_width, 2000.0);
    assert_eq!(diagnostics.split_threshold, 0.52);
    assert_eq!(diagnostics.anchors, 5);
    assert_eq!(diagnostics.attendance_fields, 5);
    assert_eq!(diagnostics.percentage_fields, 4);
    assert_eq!(diagnostics.dictionary_size, 2);
    assert_eq!(diagnostics.duplicates_merged, 1);
    assert_eq!(diagnostics.flagged_entries, 1);
    // Matching neither creates nor destroys anchors.
    assert_eq!(entries.len(), diagnostics.anchors - diagnostics.duplicates_merged);
}

#[test]
fn external_course_names_fill_gaps_or_override() {
    init();
    let names = CourseNames::from_json_file("tests/data/courses.json")
        .expect("Failed to load course names");

    let fallback = AttendanceExtractorBuilder::new()
        .course_names(names.clone())
        .build()
        .expect("Failed to build extractor")
        .extract(&load_fixture());
    assert_eq!(fallback.entries[2].course_name, "ENGINEERING MATHEMATICS");
    assert_eq!(fallback.entries[3].course_name, "Engineering Physics");
    assert!(!fallback.entries[3].flags.contains(&EntryFlag::UnknownCourse));

    let overridden = AttendanceExtractorBuilder::new()
        .course_names(names)
        .name_policy(NamePolicy::Override)
        .build()
        .expect("Failed to build extractor")
        .extract(&load_fixture());
    assert_eq!(overridden.entries[2].course_name, "Calculus and Linear Algebra");
    assert_eq!(
        overridden.entries[0].course_name,
        "FUNDAMENTALS OF DATA STRUCTURE AND ALGORITHMS"
    );
}

#[test]
fn repeated_runs_are_identical() {
    init();
    let extractor = extractor();
    let page = load_fixture();
    let first = serde_json::to_string(&extractor.extract(&page)).unwrap();
    let second = serde_json::to_string(&extractor.extract(&page)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn one_extractor_serves_many_threads() {
    init();
    let extractor = extractor();
    let page = load_fixture();
    let expected = extractor.extract(&page);

    let tight = ExtractionOptions {
        y_tolerance: 1.0,
        ..Default::default()
    };
    std::thread::scope(|scope| {
        let handles = (0..4)
            .map(|i| {
                let (extractor, page, tight) = (&extractor, &page, &tight);
                scope.spawn(move || {
                    if i % 2 == 0 {
                        extractor.extract(page)
                    } else {
                        extractor.extract_with(page, tight).unwrap()
                    }
                })
            })
            .collect::<Vec<_>>();
        for (i, handle) in handles.into_iter().enumerate() {
            let extraction = handle.join().unwrap();
            if i % 2 == 0 {
                assert_eq!(extraction, expected);
            } else {
                // A 1px window only pairs the codes on rows 350 and 450.
                assert!(extraction.entries.len() < expected.entries.len());
            }
        }
    });
}

#[test]
fn per_call_options_are_validated() {
    init();
    let extractor = extractor();
    let page = load_fixture();

    let zero_tolerance = ExtractionOptions {
        y_tolerance: 0.0,
        ..Default::default()
    };
    assert!(matches!(
        extractor.extract_with(&page, &zero_tolerance),
        Err(Error::InvalidOption {
            name: "y_tolerance",
            ..
        })
    ));

    let bad_split = ExtractionOptions {
        region_split: 0.0,
        ..Default::default()
    };
    assert!(matches!(
        extractor.extract_with(&page, &bad_split),
        Err(Error::InvalidOption {
            name: "region_split",
            ..
        })
    ));

    let extraction = extractor
        .extract_with(&page, &ExtractionOptions::default())
        .expect("Default options must be accepted");
    assert_eq!(extraction, extractor.extract(&page));
}

#[test]
fn extracts_through_a_recognizer() {
    init();
    let extractor = extractor();
    let image = DynamicImage::new_rgb8(WIDTH, 1200);
    let recognizer = PrecomputedTokens(load_fixture().tokens);

    let extraction = extractor
        .extract_image(&recognizer, &image)
        .expect("Extraction failed");
    assert_eq!(extraction, extractor.extract(&load_fixture()));

    let empty = DynamicImage::new_rgb8(0, 0);
    assert!(matches!(
        extractor.extract_image(&recognizer, &empty),
        Err(Error::InvalidImageDimensions { .. })
    ));

    let failing = |_: &DynamicImage| -> attendance_extract::Result<Vec<Token>> {
        Err(Error::Recognition("engine unavailable".into()))
    };
    assert!(matches!(
        extractor.extract_image(&failing, &image),
        Err(Error::Recognition(_))
    ));
}

#[test]
fn no_tokens_no_entries() {
    init();
    let extraction = extractor().extract(&page(Vec::new()));
    assert!(extraction.entries.is_empty());
    assert_eq!(extraction.diagnostics.left_tokens, 0);
}
