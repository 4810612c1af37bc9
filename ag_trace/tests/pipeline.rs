//! End-to-end checks over one synthetic recording: JSON bytes in, scene
//! geometry and a diagnosis out.

use ag_trace::{
    build_scene, classify, count_flags, format_report, parse_trace, LineKind, Point, RootCause,
    SceneItem, SceneOptions,
};

/// A 60 m straight pass along a reference line at E = -10 with a short
/// maneuver in the middle, sections working from the 20th sample on.
fn recording() -> String {
    let samples: Vec<String> = (0..120)
        .map(|i| {
            let t = i as f64 * 0.5;
            let n = -30.0 + t;
            let uturn = (40..50).contains(&i);
            let working = i >= 20;
            let patches = if working { (i - 19) as f64 } else { 0.0 };
            format!(
                r#"{{"t": {t}, "e": -10.0, "n": {n}, "speed": 7.2, "uturn": {uturn},
                     "pathsAway": 0.0, "jobStarted": true, "autoBtnState": "Auto",
                     "patchCounter": {patches}, "sec0_btnState": 1,
                     "sec0_on": {working}, "sec0_mapping": {working},
                     "sec0_onReq": {working}, "sec0_offReq": false,
                     "avgSpeed": 7.2, "slowCutoff": 0.5, "sec0_speedPx": 3.1}}"#
            )
        })
        .collect();

    format!(
        r#"{{
            "tractorPath": [{path}],
            "fieldBoundary": [{{"e": -25.0, "n": -50.0}}, {{"e": 25.0, "n": -50.0}},
                              {{"e": 25.0, "n": 50.0}}, {{"e": -25.0, "n": 50.0}}],
            "turnLines": [{{"e": -25.0, "n": 45.0}}, {{"e": 25.0, "n": 45.0}}],
            "turnPattern": [{{"e": -10.0, "n": 40.0}}, {{"e": -9.0, "n": 42.0}},
                            {{"e": -8.0, "n": 44.0}}, {{"e": -6.0, "n": 45.0}}],
            "refABLine": [{{"e": -10.0, "n": -45.0}}, {{"e": -10.0, "n": 45.0}}],
            "metadata": {{"toolWidth": 5.0, "youTurnPhase": 2,
                          "isYouTurnBtnOn": true, "turnAreaWidth": 10.0,
                          "testRunDateTime": "2025-03-14 09:30:00"}}
        }}"#,
        path = samples.join(",")
    )
}

#[test]
fn scene_reconstructs_guidance_geometry() {
    let data = parse_trace(recording().as_bytes()).unwrap();
    let scene = build_scene(&data, &SceneOptions::default()).unwrap();

    let polylines = |kind: LineKind| -> Vec<Vec<Point>> {
        scene
            .items
            .iter()
            .filter_map(|item| match item {
                SceneItem::Polyline { kind: k, points } if *k == kind => Some(points.clone()),
                _ => None,
            })
            .collect()
    };

    // reference line clipped to the boundary extent: [-50, 50] +/- 30%
    let reference = &polylines(LineKind::ReferenceLine)[0];
    assert_eq!(reference[0], Point::new(-10.0, -80.0));
    assert_eq!(reference[1], Point::new(-10.0, 80.0));

    // pathsAway is 0 throughout, so no offset tracks are fanned out
    assert!(polylines(LineKind::OffsetTrack).is_empty());

    // one maneuver run bracketed by straight runs, nothing lost
    let straight = polylines(LineKind::PathStraight);
    let maneuver = polylines(LineKind::PathManeuver);
    assert_eq!((straight.len(), maneuver.len()), (2, 1));
    let total: usize = straight.iter().chain(maneuver.iter()).map(Vec::len).sum();
    assert_eq!(total, 120);
    assert_eq!(maneuver[0].len(), 10);

    // boundary-driven axis focus
    let axis = scene.axis.unwrap();
    assert_eq!(axis.e_min, -35.0);
    assert_eq!(axis.n_max, 65.0);
}

#[test]
fn diagnosis_of_a_working_run_is_nominal() {
    let data = parse_trace(recording().as_bytes()).unwrap();
    let counts = count_flags(&data.tractor_path).unwrap();
    assert_eq!(counts.total, 120);
    assert_eq!(counts.job_started, 120);
    assert_eq!(counts.section_mapping, 100);

    let cause = classify(&counts);
    assert_eq!(cause, RootCause::Nominal);

    let report = format_report("synthetic.json", &data.tractor_path, &counts, cause);
    assert!(report.contains("Total path points: 120"));
    assert!(report.contains("sec0_mapping=true: 100 / 120 (83.3%)"));
    assert!(report.contains("NOMINAL"));
}
