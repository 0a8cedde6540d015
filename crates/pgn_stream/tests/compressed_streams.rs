use std::fs::File;
use std::io::{BufWriter, Write};

use pgn_stream::{
    AcceptAll, BoundaryMode, ChunkIter, Codec, Completion, DecodeError, MinRating, Pipeline,
    PipelineConfig, PipelineError, ReaderSource, RunStatus,
};

fn game(i: usize, white: u32, black: u32) -> String {
    format!(
        "[Event \"Rated Blitz game {i}\"]\n[WhiteElo \"{white}\"]\n[BlackElo \"{black}\"]\n[TimeControl \"180+2\"]\n\n1. e4 e5 2. Nf3 Nc6 1-0\n\n"
    )
}

fn dataset(games: usize) -> String {
    (0..games)
        .map(|i| game(i, 1500 + (i as u32 % 8) * 100, 2200 - (i as u32 % 5) * 100))
        .collect()
}

fn compress(codec: Codec, data: &[u8]) -> Vec<u8> {
    match codec {
        Codec::Identity => data.to_vec(),
        Codec::Bzip2 => {
            let mut enc =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            enc.write_all(data).unwrap();
            enc.finish().unwrap()
        }
        Codec::Gzip => {
            let mut enc =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(data).unwrap();
            enc.finish().unwrap()
        }
        Codec::Zstd => zstd::encode_all(data, 3).unwrap(),
    }
}

fn run_chunked(
    codec: Codec,
    input: &[u8],
    chunk_size: usize,
    config: &PipelineConfig,
    threshold: Option<i64>,
) -> (pgn_stream::RunReport, Vec<u8>) {
    let chunks: Vec<Vec<u8>> = input.chunks(chunk_size).map(<[u8]>::to_vec).collect();
    let predicate: Box<dyn pgn_stream::RecordPredicate> = match threshold {
        Some(threshold) => Box::new(MinRating::new(threshold)),
        None => Box::new(AcceptAll),
    };
    let pipeline = Pipeline::new(config, codec.decoder().unwrap(), predicate, Vec::new());
    pipeline.run(&mut ChunkIter::new(chunks))
}

#[test]
fn every_codec_yields_the_same_filtered_output() {
    let text = dataset(200);
    let config = PipelineConfig::default().with_boundary(BoundaryMode::MoveText);
    let (plain_report, plain_out) =
        run_chunked(Codec::Identity, text.as_bytes(), 4096, &config, Some(1800));
    assert_eq!(plain_report.completion(), Some(Completion::SourceExhausted));
    assert_eq!(plain_report.stats.records_scanned, 200);
    assert!(plain_report.stats.records_emitted > 0);
    assert!(plain_report.stats.records_emitted < 200);

    for codec in [Codec::Bzip2, Codec::Gzip, Codec::Zstd] {
        let compressed = compress(codec, text.as_bytes());
        for chunk_size in [1, 13, 8192] {
            let (report, out) = run_chunked(codec, &compressed, chunk_size, &config, Some(1800));
            assert_eq!(
                report.completion(),
                Some(Completion::SourceExhausted),
                "{codec:?} / {chunk_size}"
            );
            assert_eq!(report.stats, pgn_stream::RunStats {
                chunks_read: report.stats.chunks_read,
                bytes_read: compressed.len() as u64,
                ..plain_report.stats.clone()
            });
            assert_eq!(out, plain_out, "{codec:?} / {chunk_size}");
        }
    }
}

#[test]
fn blank_mode_splits_tag_section_from_moves() {
    let text = dataset(3);
    let (report, out) = run_chunked(
        Codec::Identity,
        text.as_bytes(),
        64,
        &PipelineConfig::default(),
        None,
    );
    assert_eq!(report.stats.records_scanned, 6);
    assert_eq!(out, text.as_bytes());
}

#[test]
fn quota_stops_a_compressed_run_early() {
    let text = dataset(500);
    let compressed = compress(Codec::Gzip, text.as_bytes());
    let config = PipelineConfig::default()
        .with_boundary(BoundaryMode::MoveText)
        .with_max_output_records(10);
    let (report, out) = run_chunked(Codec::Gzip, &compressed, 256, &config, None);

    assert_eq!(report.completion(), Some(Completion::QuotaReached));
    assert_eq!(report.stats.records_emitted, 10);
    assert!(report.stats.bytes_read < compressed.len() as u64);
    let expected: String = (0..10)
        .map(|i| game(i, 1500 + (i as u32 % 8) * 100, 2200 - (i as u32 % 5) * 100))
        .collect();
    assert_eq!(String::from_utf8(out).unwrap(), expected);
}

#[test]
fn corrupt_tail_keeps_records_written_before_it() {
    let first = dataset(5);
    let mut input = compress(Codec::Bzip2, first.as_bytes());
    input.extend_from_slice(b"this is not a bzip2 stream");
    let config = PipelineConfig::default().with_boundary(BoundaryMode::MoveText);

    let (report, out) = run_chunked(Codec::Bzip2, &input, 8192, &config, None);

    assert!(matches!(
        report.status,
        RunStatus::Failed(PipelineError::CorruptStream { .. })
    ));
    assert_eq!(report.stats.records_emitted, 5);
    assert_eq!(out, first.as_bytes());
}

#[test]
fn truncated_bzip2_reports_failure() {
    let text = dataset(50);
    let compressed = compress(Codec::Bzip2, text.as_bytes());
    let truncated = &compressed[..compressed.len() - 10];
    let (report, _) = run_chunked(
        Codec::Bzip2,
        truncated,
        512,
        &PipelineConfig::default(),
        None,
    );
    let err = report.error().expect("truncated input must fail");
    assert!(err.to_string().contains("bzip2"));
}

#[test]
fn truncated_zstd_reports_failure() {
    let text = dataset(200);
    let compressed = compress(Codec::Zstd, text.as_bytes());
    let truncated = &compressed[..compressed.len() / 2];
    let config = PipelineConfig::default().with_boundary(BoundaryMode::MoveText);
    let (report, _) = run_chunked(Codec::Zstd, truncated, 512, &config, None);

    assert!(matches!(
        report.status,
        RunStatus::Failed(PipelineError::CorruptStream {
            source: DecodeError::Truncated { codec: "zstd" },
            ..
        })
    ));
    assert!(report.stats.records_emitted < 200);
}

#[test]
fn truncated_gzip_fails_its_checksum() {
    let text = dataset(200);
    let compressed = compress(Codec::Gzip, text.as_bytes());
    let truncated = &compressed[..compressed.len() / 2];
    let config = PipelineConfig::default().with_boundary(BoundaryMode::MoveText);
    let (report, out) = run_chunked(Codec::Gzip, truncated, 512, &config, None);

    assert!(matches!(
        report.status,
        RunStatus::Failed(PipelineError::CorruptStream {
            source: DecodeError::Corrupt { codec: "gzip", .. },
            ..
        })
    ));
    assert!(report.stats.records_emitted < 200);
    assert!(text.as_bytes().starts_with(&out));
}

/// Rejects any write that would take it past `cap` bytes.
struct CappedSink {
    written: Vec<u8>,
    cap: usize,
}

impl Write for CappedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.written.len() + buf.len() > self.cap {
            return Err(std::io::Error::other("device full"));
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn sink_failure_keeps_only_whole_games() {
    let text = dataset(5);
    let config = PipelineConfig::default().with_boundary(BoundaryMode::MoveText);
    let sink = CappedSink {
        written: Vec::new(),
        cap: 150,
    };
    let chunks = vec![text.into_bytes()];
    let pipeline = Pipeline::new(
        &config,
        Codec::Identity.decoder().unwrap(),
        Box::new(AcceptAll),
        sink,
    );
    let (report, sink) = pipeline.run(&mut ChunkIter::new(chunks));

    assert!(matches!(report.status, RunStatus::Failed(PipelineError::Sink(_))));
    assert_eq!(report.stats.records_emitted, 1);
    assert_eq!(String::from_utf8(sink.written).unwrap(), game(0, 1500, 2200));
}

#[test]
fn reads_a_compressed_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("games.pgn.zst");
    let text = dataset(40);
    std::fs::write(&path, compress(Codec::Zstd, text.as_bytes())).unwrap();

    let codec = Codec::from_path(&path);
    assert_eq!(codec, Codec::Zstd);

    let out_path = dir.path().join("out.pgn");
    let sink = BufWriter::new(File::create(&out_path).unwrap());
    let config = PipelineConfig::default().with_boundary(BoundaryMode::MoveText);
    let pipeline = Pipeline::new(&config, codec.decoder().unwrap(), Box::new(AcceptAll), sink);
    let mut source = ReaderSource::new(File::open(&path).unwrap());
    let (report, sink) = pipeline.run(&mut source);
    drop(sink);

    assert!(report.is_success());
    assert_eq!(report.stats.records_emitted, 40);
    assert_eq!(std::fs::read_to_string(&out_path).unwrap(), text);
}

#[cfg(feature = "tokio")]
#[tokio::test]
async fn async_source_matches_sync_run() {
    let text = dataset(30);
    let compressed = compress(Codec::Bzip2, text.as_bytes());
    let config = PipelineConfig::default()
        .with_boundary(BoundaryMode::MoveText)
        .with_max_output_records(7);

    let pipeline = Pipeline::new(
        &config,
        Codec::Bzip2.decoder().unwrap(),
        Box::new(AcceptAll),
        Vec::new(),
    );
    let (report, out) = pipeline.run_async(&compressed[..]).await;

    let (sync_report, sync_out) = run_chunked(Codec::Bzip2, &compressed, 8192, &config, None);
    assert_eq!(report.completion(), Some(Completion::QuotaReached));
    assert_eq!(report.stats, sync_report.stats);
    assert_eq!(out, sync_out);
}
