mod common;

use common::TestWorkspace;
use dedup_bench::{
    error::BenchError,
    estimate::{
        CHUNK_BYTES, COMPRESSED_CHUNK_BYTES, ChunkEstimator, EstimationResult, Estimator,
        ExternalDedupEstimator, ExternalToolConfig, TOTAL_LEN, TRANSMITTED_BYTES, run_estimators,
    },
};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random::<u8>()).collect()
}

#[test]
fn identical_files_deduplicate_to_half() {
    let workspace = TestWorkspace::new();
    let data = random_bytes(300_000, 1);
    let paths = vec![workspace.write("a.bin", &data), workspace.write("b.bin", &data)];

    let metrics = ChunkEstimator::default().estimate(&paths).unwrap();
    assert_eq!(metrics[TOTAL_LEN], 600_000);
    assert_eq!(metrics[CHUNK_BYTES], 300_000);
    let result = EstimationResult::from_metrics("pair", None, 2, &metrics).unwrap();
    assert_eq!(result.dedup_ratio, 0.5);
}

#[test]
fn a_small_insert_only_touches_nearby_chunks() {
    let workspace = TestWorkspace::new();
    let original = random_bytes(400_000, 2);
    let mut edited = original.clone();
    edited.splice(200_000..200_000, random_bytes(100, 3));
    let paths = vec![
        workspace.write("original.bin", &original),
        workspace.write("edited.bin", &edited),
    ];

    let metrics = common::chunk_estimator().estimate(&paths).unwrap();
    let total = metrics[TOTAL_LEN];
    assert_eq!(total, 800_100);
    // Everything but a few chunks around the insert is shared.
    assert!(metrics[CHUNK_BYTES] < 400_000 + 4 * 4096);
}

#[test]
fn compressed_bytes_reflect_chunk_compressibility() {
    let workspace = TestWorkspace::new();
    let text = "the quick brown fox jumps over the lazy dog\n".repeat(5000);
    let paths = vec![workspace.write("text.txt", text.as_bytes())];
    let metrics = ChunkEstimator::default().estimate(&paths).unwrap();
    assert!(metrics[COMPRESSED_CHUNK_BYTES] < metrics[CHUNK_BYTES]);
    assert!(metrics[CHUNK_BYTES] <= metrics[TOTAL_LEN]);
}

#[test]
fn empty_inputs_cannot_produce_a_ratio() {
    let workspace = TestWorkspace::new();
    let paths = vec![workspace.write("empty.bin", b"")];
    let estimators: Vec<Box<dyn Estimator>> = vec![Box::new(ChunkEstimator::default())];
    let metrics = run_estimators(&estimators, &paths).unwrap();
    assert_eq!(metrics[TOTAL_LEN], 0);
    assert!(matches!(
        EstimationResult::from_metrics("empty", None, 1, &metrics),
        Err(BenchError::Estimation(_))
    ));
}

#[test]
fn missing_files_fail_the_estimate() {
    let workspace = TestWorkspace::new();
    let err = ChunkEstimator::default()
        .estimate(&[workspace.path().join("nope.bin")])
        .unwrap_err();
    assert!(matches!(err, BenchError::Io(_)));
}

#[cfg(unix)]
mod external {
    use super::*;

    #[test]
    fn reads_transmitted_bytes_from_the_last_line() {
        let workspace = TestWorkspace::new();
        let program = workspace.script(
            "xtool",
            r#"[ "$XTOOL_TOKEN" = "secret" ] || exit 3
echo "scanning $# file(s)"
echo "uploaded, transmitted $#0_000 bytes""#,
        );
        let paths = vec![
            workspace.write("a.bin", b"a"),
            workspace.write("b.bin", b"b"),
        ];
        let config = ExternalToolConfig::new(program)
            .with_args(vec!["--dry-run".to_string()])
            .with_token("secret");
        let metrics = ExternalDedupEstimator::new(config)
            .estimate(&paths)
            .unwrap();
        // One argument plus two paths.
        assert_eq!(metrics[TRANSMITTED_BYTES], 30_000);
    }

    #[test]
    fn exports_the_token_under_the_configured_variable() {
        let workspace = TestWorkspace::new();
        let program = workspace.script(
            "xtool",
            r#"[ "$HUB_TOKEN" = "t0k" ] || exit 4
echo "transmitted 7""#,
        );
        let mut config = ExternalToolConfig::new(program).with_token("t0k");
        config.token_var = "HUB_TOKEN".to_string();
        let metrics = ExternalDedupEstimator::new(config)
            .estimate(&[workspace.write("a.bin", b"a")])
            .unwrap();
        assert_eq!(metrics[TRANSMITTED_BYTES], 7);
    }

    #[test]
    fn missing_token_is_an_estimation_error() {
        let workspace = TestWorkspace::new();
        let program = workspace.script("xtool", "echo transmitted 1");
        let err = ExternalDedupEstimator::new(ExternalToolConfig::new(program))
            .estimate(&[workspace.write("a.bin", b"a")])
            .unwrap_err();
        assert!(matches!(err, BenchError::Estimation(_)));
        assert!(err.to_string().contains("XTOOL_TOKEN"));
    }

    #[test]
    fn failing_or_silent_tools_are_estimation_errors() {
        let workspace = TestWorkspace::new();
        let path = workspace.write("a.bin", b"a");
        for (name, body) in [
            ("failing", "echo 'quota exceeded' >&2; exit 2"),
            ("silent", "true"),
            ("chatty", "echo done"),
        ] {
            let program = workspace.script(name, body);
            let config = ExternalToolConfig::new(program).with_token("secret");
            let err = ExternalDedupEstimator::new(config)
                .estimate(std::slice::from_ref(&path))
                .unwrap_err();
            assert!(matches!(err, BenchError::Estimation(_)), "{name}: {err}");
        }
        let program = workspace.script("failing-loud", "echo 'quota exceeded' >&2; exit 2");
        let err = ExternalDedupEstimator::new(ExternalToolConfig::new(program).with_token("x"))
            .estimate(&[path])
            .unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn unlaunchable_programs_are_estimation_errors() {
        let workspace = TestWorkspace::new();
        let config = ExternalToolConfig::new(workspace.path().join("absent")).with_token("x");
        let err = ExternalDedupEstimator::new(config)
            .estimate(&[workspace.write("a.bin", b"a")])
            .unwrap_err();
        assert!(matches!(err, BenchError::Estimation(_)));
    }
}
