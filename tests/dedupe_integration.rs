//! Integration tests for dejavu.
//!
//! Exercises the public API end to end: fingerprinting, storage, search,
//! and the save/compare classification flows.
#![allow(
    clippy::panic,
    clippy::too_many_lines,
    clippy::cast_possible_truncation,
    clippy::uninlined_format_args
)]

use chrono::DateTime;
use dejavu::{
    ConversationId, DedupeService, Fingerprint, FingerprintPair, FingerprintStore, Fingerprinter,
    MediaFingerprints, MediaKind, MessageId, PostMeta, SaveOutcome, SqliteStore, StoredRecord,
    ThresholdConfig, UserId,
};
use image::{DynamicImage, ImageBuffer, Rgb};

fn gradient_x() -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(64, 64, |x, _| Rgb([(x * 4) as u8, 0, 0])))
}

fn gradient_y() -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(64, 64, |_, y| Rgb([(y * 4) as u8, 0, 0])))
}

fn meta(message: i64, conversation: i64) -> PostMeta {
    PostMeta::new(
        MessageId::new(message),
        ConversationId::new(conversation),
        UserId::new(77),
        DateTime::from_timestamp(1_700_000_000 + message, 0).unwrap(),
    )
}

fn service() -> DedupeService<SqliteStore> {
    DedupeService::new(
        SqliteStore::in_memory().unwrap(),
        Fingerprinter::new(),
        ThresholdConfig::default(),
    )
}

/// Twelve frames: sampled positions 1 and 3 show `early`, 9 and 10 `late`.
fn twelve_frames(early: &DynamicImage, late: &DynamicImage) -> Vec<DynamicImage> {
    (0..12)
        .map(|i| {
            if i == 9 || i == 10 {
                late.clone()
            } else {
                early.clone()
            }
        })
        .collect()
}

mod image_flow {
    use super::*;

    #[test]
    fn test_repost_detected_and_not_persisted() {
        let service = service();
        let image = gradient_x();

        let first = service.save_image(&meta(1, 500), &image).unwrap();
        assert_eq!(first, SaveOutcome::Stored);

        let second = service.save_image(&meta(2, 500), &image).unwrap();
        match second {
            SaveOutcome::Duplicate(m) => {
                assert_eq!(m.meta.message_id, MessageId::new(1));
                assert_eq!(m.meta.user_id, UserId::new(77));
                assert_eq!(m.distance, 0);
            },
            SaveOutcome::Stored => panic!("repost was stored as new content"),
        }

        // The duplicate never reached the database.
        assert_eq!(service.store().count(MediaKind::Image).unwrap(), 1);
    }

    #[test]
    fn test_distinct_images_both_stored() {
        let service = service();

        let first = service.save_image(&meta(1, 500), &gradient_x()).unwrap();
        let second = service.save_image(&meta(2, 500), &gradient_y()).unwrap();

        assert_eq!(first, SaveOutcome::Stored);
        assert_eq!(second, SaveOutcome::Stored);
        assert_eq!(service.store().count(MediaKind::Image).unwrap(), 2);
    }

    #[test]
    fn test_compare_lists_all_matches_worst_first() {
        let service = service();
        let image = gradient_x();
        let probe = Fingerprinter::new().fingerprint_image(&image);

        // Three rows at distances 2, 7, and 12 from the probe, inserted
        // out of distance order.
        for (message, flipped) in [(1_i64, 7_u32), (2, 12), (3, 2)] {
            let difference =
                Fingerprint::difference(probe.difference.bits ^ ((1_u64 << flipped) - 1));
            service
                .store()
                .save(&StoredRecord::new(
                    meta(message, 500),
                    MediaFingerprints::Image(FingerprintPair::new(probe.perceptual, difference)),
                ))
                .unwrap();
        }

        let matches = service.compare_image(&meta(99, 500), &image).unwrap();

        let distances: Vec<u32> = matches.iter().map(|m| m.distance).collect();
        assert_eq!(distances, vec![12, 7, 2]);

        // Compare is read-only.
        assert_eq!(service.store().count(MediaKind::Image).unwrap(), 3);
    }

    #[test]
    fn test_compare_excludes_the_referenced_message() {
        let service = service();
        let image = gradient_x();
        service.save_image(&meta(1, 500), &image).unwrap();

        let matches = service.compare_image(&meta(1, 500), &image).unwrap();
        assert!(matches.is_empty());

        let matches = service.compare_image(&meta(2, 500), &image).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].meta.message_id, MessageId::new(1));
    }

    #[test]
    fn test_file_backed_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("posts.db");
        let image = gradient_x();

        {
            let service = DedupeService::new(
                SqliteStore::new(&db_path).unwrap(),
                Fingerprinter::new(),
                ThresholdConfig::default(),
            );
            service.save_image(&meta(1, 500), &image).unwrap();
        }

        let service = DedupeService::new(
            SqliteStore::new(&db_path).unwrap(),
            Fingerprinter::new(),
            ThresholdConfig::default(),
        );
        let outcome = service.save_image(&meta(2, 500), &image).unwrap();

        assert!(outcome.is_duplicate());
    }
}

mod video_flow {
    use super::*;
    use dejavu::{Error, sample_positions};

    #[test]
    fn test_sampling_positions() {
        assert_eq!(sample_positions(12).unwrap(), [1, 3, 9, 10]);
        assert_eq!(sample_positions(4).unwrap(), [1, 1, 3, 2]);
        assert_eq!(sample_positions(100).unwrap(), [1, 25, 75, 98]);
    }

    #[test]
    fn test_short_video_rejected() {
        let service = service();
        let frames = vec![gradient_x(); 3];

        let err = service.save_video(&meta(1, 500), &frames).unwrap_err();

        assert!(matches!(err, Error::InsufficientFrames { got: 3, need: 4 }));
    }

    #[test]
    fn test_video_repost_detected() {
        let service = service();
        let frames = twelve_frames(&gradient_x(), &gradient_y());

        service.save_video(&meta(1, 500), &frames).unwrap();
        let outcome = service.save_video(&meta(2, 500), &frames).unwrap();

        match outcome {
            SaveOutcome::Duplicate(m) => {
                assert_eq!(m.meta.message_id, MessageId::new(1));
                assert_eq!(m.distance, 0);
            },
            SaveOutcome::Stored => panic!("identical video was stored as new content"),
        }
        assert_eq!(service.store().count(MediaKind::Video).unwrap(), 1);
    }

    #[test]
    fn test_video_with_swapped_scenes_stored() {
        let service = service();
        let a = gradient_x();
        let b = gradient_y();

        service
            .save_video(&meta(1, 500), &twelve_frames(&a, &b))
            .unwrap();
        // Same scenes in the opposite order: positional pairing compares
        // a-frames with b-frames throughout.
        let outcome = service
            .save_video(&meta(2, 500), &twelve_frames(&b, &a))
            .unwrap();

        assert_eq!(outcome, SaveOutcome::Stored);
        assert_eq!(service.store().count(MediaKind::Video).unwrap(), 2);
    }

    #[test]
    fn test_video_compare_read_only() {
        let service = service();
        let frames = twelve_frames(&gradient_x(), &gradient_y());
        service.save_video(&meta(1, 500), &frames).unwrap();

        let matches = service.compare_video(&meta(9, 500), &frames).unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].distance, 0);
        assert_eq!(service.store().count(MediaKind::Video).unwrap(), 1);
    }
}

mod search_behavior {
    use super::*;
    use dejavu::{Classification, search_similar};

    /// Seeds image rows whose difference hashes sit at the given distances
    /// from an all-zero probe.
    fn seed_rows(store: &SqliteStore, conversation: i64, distances: &[(i64, u32)]) {
        for &(message, flipped) in distances {
            let record = StoredRecord::new(
                meta(message, conversation),
                MediaFingerprints::Image(FingerprintPair::new(
                    Fingerprint::perceptual(0),
                    Fingerprint::difference((1_u64 << flipped) - 1),
                )),
            );
            store.save(&record).unwrap();
        }
    }

    #[test]
    fn test_limit_one_keeps_newest_and_stops_scanning() {
        let store = SqliteStore::in_memory().unwrap();
        seed_rows(&store, 500, &[(1, 3), (2, 3), (3, 3), (4, 3), (5, 3)]);
        let probe = Fingerprint::difference(0);

        let mut classified = Vec::new();
        let matches = search_similar(
            &store,
            ConversationId::new(500),
            MediaKind::Image,
            1,
            |record| {
                classified.push(record.meta.message_id.value());
                let pair = record.as_image().unwrap();
                let distance = probe.distance(&pair.difference)?;
                Ok(Classification::new(distance, distance < 10))
            },
        )
        .unwrap();

        // Newest match wins and nothing older is even classified.
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].meta.message_id, MessageId::new(5));
        assert_eq!(classified, vec![5]);
    }

    #[test]
    fn test_unlimited_search_sorts_worst_first() {
        let store = SqliteStore::in_memory().unwrap();
        seed_rows(&store, 500, &[(1, 4), (2, 9), (3, 1), (4, 6)]);
        let probe = Fingerprint::difference(0);

        let matches = search_similar(
            &store,
            ConversationId::new(500),
            MediaKind::Image,
            0,
            |record| {
                let pair = record.as_image().unwrap();
                let distance = probe.distance(&pair.difference)?;
                Ok(Classification::new(distance, distance < 10))
            },
        )
        .unwrap();

        let distances: Vec<u32> = matches.iter().map(|m| m.distance).collect();
        assert_eq!(distances, vec![9, 6, 4, 1]);
    }

    #[test]
    fn test_resave_same_key_is_noop() {
        let store = SqliteStore::in_memory().unwrap();
        let original = StoredRecord::new(
            meta(1, 500),
            MediaFingerprints::Image(FingerprintPair::new(
                Fingerprint::perceptual(0xaaaa),
                Fingerprint::difference(0xbbbb),
            )),
        );
        let replacement = StoredRecord::new(
            meta(1, 500),
            MediaFingerprints::Image(FingerprintPair::new(
                Fingerprint::perceptual(0x1111),
                Fingerprint::difference(0x2222),
            )),
        );

        store.save(&original).unwrap();
        store.save(&replacement).unwrap();

        let records = store
            .query(ConversationId::new(500), MediaKind::Image)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], original);
    }

    #[test]
    fn test_conversation_isolation() {
        let service = service();
        let image = gradient_x();
        service.save_image(&meta(1, 500), &image).unwrap();

        // Same image in another conversation is new content there.
        let outcome = service.save_image(&meta(1, 600), &image).unwrap();
        assert_eq!(outcome, SaveOutcome::Stored);

        let matches = service.compare_image(&meta(9, 600), &image).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(
            matches[0].meta.conversation_id,
            ConversationId::new(600)
        );
    }
}

mod failure_modes {
    use super::*;
    use dejavu::{Error, FingerprintStore, Result, ScanFlow};

    /// Store whose every operation fails, for error propagation checks.
    struct FailingStore;

    impl FingerprintStore for FailingStore {
        fn save(&self, _record: &StoredRecord) -> Result<()> {
            Err(Error::StorageIo {
                operation: "save_record".to_string(),
                cause: "disk failure".to_string(),
            })
        }

        fn scan(
            &self,
            _conversation: ConversationId,
            _kind: MediaKind,
            _visit: &mut dyn FnMut(StoredRecord) -> Result<ScanFlow>,
        ) -> Result<()> {
            Err(Error::StorageIo {
                operation: "scan_records".to_string(),
                cause: "disk failure".to_string(),
            })
        }

        fn count(&self, _kind: MediaKind) -> Result<u64> {
            Err(Error::StorageIo {
                operation: "count_records".to_string(),
                cause: "disk failure".to_string(),
            })
        }
    }

    #[test]
    fn test_store_failure_propagates_through_save() {
        let service = DedupeService::new(
            FailingStore,
            Fingerprinter::new(),
            ThresholdConfig::default(),
        );

        let err = service.save_image(&meta(1, 500), &gradient_x()).unwrap_err();

        assert!(matches!(err, Error::StorageIo { .. }));
    }

    #[test]
    fn test_store_failure_propagates_through_compare() {
        let service = DedupeService::new(
            FailingStore,
            Fingerprinter::new(),
            ThresholdConfig::default(),
        );

        let err = service
            .compare_image(&meta(1, 500), &gradient_x())
            .unwrap_err();

        assert!(matches!(err, Error::StorageIo { .. }));
    }
}
