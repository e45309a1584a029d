//! # Index Integration Tests
//!
//! End-to-end tests over the public API: a dataset file is indexed into
//! sorted partitions, queried through the session, and the results are
//! compared against brute force.
//!
//! ## Test Strategy
//!
//! 1. Write a dataset into a temp directory
//! 2. Index it with a small chunk capacity so partitions spill into
//!    multiple merge rounds
//! 3. Verify partition contents and query results
//!
//! ## Usage
//!
//! ```sh
//! cargo test --test index_integration -- --nocapture
//! ```

use std::fs;
use std::path::Path;
use cityblock::RangeIndex;

use cityblock::config::MATCH_SINK_FILE_NAME;
use cityblock::partition::bucket_key;
use cityblock::sorter::{is_sorted, read_partition};
use cityblock::{
    city_block, classify, ErrorKind, FileSink, MergeStrategy, Session, SortedArrayIndex, Vector,
};
use tempfile::TempDir;

const SCENARIO: &str = "250,250,250\n0,0,0\n200,200,200\n";

fn write_dataset(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("images.csv");
    fs::write(&path, contents).expect("Failed to write dataset");
    path
}

/// Deterministic pseudo-random dataset with channels in `[180, 255]`.
fn generate_dataset(count: usize, dimensionality: usize, seed: u64) -> Vec<Vec<i32>> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as i32
    };

    (0..count)
        .map(|_| (0..dimensionality).map(|_| 180 + next().rem_euclid(76)).collect())
        .collect()
}

fn to_csv(vectors: &[Vec<i32>]) -> String {
    let mut out = String::new();
    for v in vectors {
        let line: Vec<String> = v.iter().map(|x| x.to_string()).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn brute_force(dataset: &[Vec<i32>], query: &[i32], threshold: f64) -> Vec<Vec<i32>> {
    let mut found: Vec<Vec<i32>> = dataset
        .iter()
        .filter(|v| city_block(query, v).unwrap() <= threshold)
        .cloned()
        .collect();
    found.sort();
    found
}

fn sorted_matches(matches: Vec<Vector>) -> Vec<Vec<i32>> {
    let mut out: Vec<Vec<i32>> = matches.into_iter().map(Vector::into_inner).collect();
    out.sort();
    out
}

#[test]
fn scenario_sink_holds_the_single_match() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let dataset = write_dataset(dir.path(), SCENARIO);

    let session = Session::builder()
        .index_file(&dataset)
        .expect("Failed to index dataset");
    assert_eq!(session.produced_keys(), &[5, 255, 55]);

    let sink_path = dir.path().join(MATCH_SINK_FILE_NAME);
    let mut sink = FileSink::new(&sink_path);
    let query = session.parse_query("248,248,248").unwrap();
    let stats = session.query(&query, 5.0, &mut sink).unwrap();

    assert_eq!(stats.candidates, 1);
    assert_eq!(stats.matches, 1);
    assert_eq!(fs::read_to_string(&sink_path).unwrap(), "250,250,250\n");
}

#[test]
fn repeated_query_appends_matches_again() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let dataset = write_dataset(dir.path(), SCENARIO);
    let session = Session::builder().index_file(&dataset).unwrap();

    let sink_path = dir.path().join("matches.csv");
    let mut sink = FileSink::new(&sink_path);
    let query = session.parse_query("248,248,248").unwrap();
    session.query(&query, 5.0, &mut sink).unwrap();
    session.query(&query, 5.0, &mut sink).unwrap();

    assert_eq!(
        fs::read_to_string(&sink_path).unwrap(),
        "250,250,250\n250,250,250\n"
    );
}

#[test]
fn search_matches_brute_force_across_strategies_and_indexes() {
    let data = generate_dataset(600, 6, 0x5eed);
    let queries = generate_dataset(12, 6, 0xfeed);
    // Exact distances are multiples of 1/6; no threshold sits on one.
    let thresholds = [0.0, 1.4, 4.1, 9.3, 20.05];

    let pairwise_dir = TempDir::new().unwrap();
    let pairwise = Session::builder()
        .chunk_capacity(7)
        .index_file(write_dataset(pairwise_dir.path(), &to_csv(&data)))
        .unwrap();

    let kway_dir = TempDir::new().unwrap();
    let kway = Session::builder()
        .workspace(kway_dir.path())
        .chunk_capacity(5)
        .merge_strategy(MergeStrategy::KWay)
        .index_file_with(
            write_dataset(kway_dir.path(), &to_csv(&data)),
            SortedArrayIndex::new(),
        )
        .unwrap();

    for query in &queries {
        let vector = Vector::new(query.clone());
        for &threshold in &thresholds {
            let expected = brute_force(&data, query, threshold);

            let found = sorted_matches(pairwise.search(&vector, threshold).unwrap());
            assert_eq!(found, expected, "pairwise, query {:?}, τ={}", query, threshold);

            let found = sorted_matches(kway.search(&vector, threshold).unwrap());
            assert_eq!(found, expected, "k-way, query {:?}, τ={}", query, threshold);
        }
    }

    let dataset_vector = Vector::new(data[17].clone());
    assert!(pairwise
        .search(&dataset_vector, 0.0)
        .unwrap()
        .contains(&dataset_vector));
}

#[test]
fn every_record_lives_in_its_key_partition_in_sorted_order() {
    let data = generate_dataset(400, 4, 42);
    let dir = TempDir::new().unwrap();
    let session = Session::builder()
        .chunk_capacity(3)
        .index_file(write_dataset(dir.path(), &to_csv(&data)))
        .unwrap();

    let reference = vec![255; 4];
    let expected_keys: Vec<i64> = data
        .iter()
        .map(|v| bucket_key(city_block(&reference, v).unwrap()))
        .collect();
    assert_eq!(session.produced_keys(), expected_keys.as_slice());

    let mut total = 0;
    for partition in session.partitions().iter() {
        assert!(is_sorted(partition.path()).unwrap());
        let records = read_partition(partition.path()).unwrap();
        for record in &records {
            assert_eq!(bucket_key(record.distance), partition.key());
            assert_eq!(
                record.distance,
                city_block(&reference, record.vector.as_slice()).unwrap()
            );
        }
        total += records.len();
    }
    assert_eq!(total, data.len());
    assert_eq!(session.index().len(), session.partitions().len());
}

#[test]
fn equal_distances_keep_dataset_order_through_many_merge_rounds() {
    // Every record has key 7: five at distance 7.5, three at 7.0.
    let dataset = "250,245\n248,248\n245,250\n255,240\n249,247\n240,255\n247,248\n241,255\n";
    let dir = TempDir::new().unwrap();
    let session = Session::builder()
        .chunk_capacity(2)
        .index_file(write_dataset(dir.path(), dataset))
        .unwrap();

    let partition = session.partitions().get(7).expect("key 7 partition");
    let order: Vec<Vec<i32>> = read_partition(partition.path())
        .unwrap()
        .into_iter()
        .map(|r| r.vector.into_inner())
        .collect();

    assert_eq!(
        order,
        vec![
            vec![248, 248],
            vec![249, 247],
            vec![241, 255],
            vec![250, 245],
            vec![245, 250],
            vec![255, 240],
            vec![240, 255],
            vec![247, 248],
        ]
    );
}

#[test]
fn partition_one_larger_than_chunk_capacity_sorts() {
    // D=10, distances 5.9, 5.7, 5.5, 5.3, 5.1: one partition, reverse order.
    let dataset = [59, 57, 55, 53, 51]
        .iter()
        .map(|&gap: &i32| {
            let mut v = vec![250; 10];
            v[0] = 255 - (gap - 45);
            v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(",")
        })
        .collect::<Vec<_>>()
        .join("\n");

    let dir = TempDir::new().unwrap();
    let session = Session::builder()
        .chunk_capacity(4)
        .index_file(write_dataset(dir.path(), &dataset))
        .unwrap();

    assert_eq!(session.partitions().len(), 1);
    let partition = session.partitions().get(5).expect("key 5 partition");
    let distances: Vec<f64> = read_partition(partition.path())
        .unwrap()
        .iter()
        .map(|r| r.distance)
        .collect();
    assert_eq!(distances, vec![5.1, 5.3, 5.5, 5.7, 5.9]);
}

#[test]
fn empty_dataset_yields_an_empty_session() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), "\n\n");

    let session = Session::builder().index_file(&dataset).unwrap();

    assert!(session.is_empty());
    assert_eq!(session.record_count(), 0);
    assert!(session.partitions().is_empty());
    assert!(session
        .search(&Vector::new(vec![1, 2, 3]), 100.0)
        .unwrap()
        .is_empty());
    session.close().unwrap();
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn sessions_sharing_a_directory_do_not_disturb_each_other() {
    let dir = TempDir::new().unwrap();
    let first_dataset = dir.path().join("first.csv");
    let second_dataset = dir.path().join("second.csv");
    fs::write(&first_dataset, "250,250,250\n").unwrap();
    // Same bucket key (5) as the first dataset.
    fs::write(&second_dataset, "251,249,250\n").unwrap();

    let first = Session::builder().index_file(&first_dataset).unwrap();
    let second = Session::builder().index_file(&second_dataset).unwrap();
    assert_eq!(first.produced_keys(), second.produced_keys());

    let query = Vector::new(vec![250, 250, 250]);
    assert_eq!(first.search(&query, 0.0).unwrap(), vec![query.clone()]);
    assert!(second.search(&query, 0.0).unwrap().is_empty());

    drop(second);

    assert_eq!(first.search(&query, 0.0).unwrap(), vec![query.clone()]);
    first.close().unwrap();

    let mut remaining: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    remaining.sort();
    assert_eq!(remaining, vec!["first.csv".to_string(), "second.csv".to_string()]);
}

#[test]
fn many_distinct_keys_index_and_search() {
    // D=1: 256 distinct keys, each visited twice.
    let data: Vec<Vec<i32>> = (0..2).flat_map(|_| (0..=255).rev().map(|v| vec![v])).collect();
    let dir = TempDir::new().unwrap();
    let session = Session::builder()
        .chunk_capacity(1)
        .merge_strategy(MergeStrategy::KWay)
        .index_file(write_dataset(dir.path(), &to_csv(&data)))
        .unwrap();

    assert_eq!(session.partitions().len(), 256);
    assert_eq!(session.record_count(), 512);
    let found = sorted_matches(session.search(&Vector::new(vec![100]), 1.5).unwrap());
    assert_eq!(
        found,
        vec![vec![99], vec![99], vec![100], vec![100], vec![101], vec![101]]
    );
}

#[test]
fn malformed_dataset_leaves_no_partitions() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), "250,250,250\n0,0,0\n1,2\n");

    let err = Session::builder().index_file(&dataset).unwrap_err();

    assert_eq!(classify(&err), ErrorKind::MalformedRecord);
    let remaining: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(remaining, vec![std::ffi::OsString::from("images.csv")]);
}

#[test]
fn invalid_threshold_does_not_touch_the_sink() {
    let dir = TempDir::new().unwrap();
    let session = Session::builder()
        .index_file(write_dataset(dir.path(), SCENARIO))
        .unwrap();
    let sink_path = dir.path().join("matches.csv");
    let query = session.parse_query("248,248,248").unwrap();

    let err = session
        .query(&query, -1.0, &mut FileSink::new(&sink_path))
        .unwrap_err();

    assert_eq!(classify(&err), ErrorKind::InvalidThreshold);
    assert!(!sink_path.exists());
}

#[test]
fn close_removes_partitions_but_keeps_the_sink() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SCENARIO);
    let session = Session::builder().index_file(&dataset).unwrap();

    let sink_path = dir.path().join(MATCH_SINK_FILE_NAME);
    let query = session.parse_query("248,248,248").unwrap();
    session
        .query(&query, 5.0, &mut FileSink::new(&sink_path))
        .unwrap();
    session.close().unwrap();

    let mut remaining: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    remaining.sort();
    assert_eq!(remaining, vec![MATCH_SINK_FILE_NAME.to_string(), "images.csv".to_string()]);
}
