mod common;

use std::collections::HashSet;

use common::{record, Never, StopAfterPolls};
use keyfed_db::{insert_infection, iterate_infections, run_migrations};
use keyfed_federation::{fetch, FetchError, StopReason};
use keyfed_types::{FetchRequest, FetchResponse};
use rusqlite::Connection;

const UNTIL: i64 = 10_000;

fn seeded_store() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    run_migrations(&conn).unwrap();

    let rows: [(&str, &[&str], i64, bool); 8] = [
        ("us-1", &["us"], 100, true),
        ("ca-us", &["CA", "US"], 110, true),
        ("mx-1", &["MX"], 120, true),
        ("remote", &["US"], 130, false),
        ("us-2", &["US"], 130, true),
        ("us-ca", &["US", "CA"], 140, true),
        ("mx-2", &["MX"], 150, true),
        ("future", &["US"], UNTIL + 1, true),
    ];
    for (key, regions, created_at, local) in rows {
        let mut r = record(key, regions, created_at);
        r.local_provenance = local;
        insert_infection(&conn, &r).unwrap();
    }
    conn
}

fn keys(resp: &FetchResponse) -> Vec<String> {
    resp.response
        .iter()
        .flat_map(|ctr| &ctr.contact_tracing_info)
        .flat_map(|cti| &cti.diagnosis_keys)
        .map(|k| String::from_utf8(k.diagnosis_key.clone()).unwrap())
        .collect()
}

/// Fetches `req` in slices of `per_call` records, following continuation
/// tokens until a complete response arrives.
fn fetch_in_slices(conn: &Connection, req: FetchRequest, per_call: usize) -> Vec<FetchResponse> {
    let mut responses = Vec::new();
    let mut token = String::new();
    loop {
        let signal = StopAfterPolls::new(per_call, StopReason::DeadlineExceeded);
        let call = FetchRequest {
            next_fetch_token: token.clone(),
            ..req.clone()
        };
        let resp = fetch(&signal, call, |c| iterate_infections(conn, c, 2), UNTIL).unwrap();
        let done = !resp.partial_response;
        token = resp.next_fetch_token.clone();
        responses.push(resp);
        if done {
            return responses;
        }
        assert!(responses.len() < 20, "paging did not converge");
    }
}

#[test]
fn full_fetch_returns_local_records_inside_the_window() {
    let conn = seeded_store();

    let resp = fetch(
        &Never,
        FetchRequest::default(),
        |c| iterate_infections(&conn, c, 3),
        UNTIL,
    )
    .unwrap();

    assert!(!resp.partial_response);
    assert_eq!(resp.next_fetch_token, "");
    assert_eq!(resp.fetch_response_key_timestamp, 150);
    assert_eq!(
        keys(&resp),
        vec!["us-1", "us-2", "ca-us", "us-ca", "mx-1", "mx-2"]
    );

    let groups: Vec<&[String]> = resp
        .response
        .iter()
        .map(|ctr| ctr.region_identifiers.as_slice())
        .collect();
    assert_eq!(
        groups,
        vec![
            &["US".to_string()][..],
            &["CA".to_string(), "US".to_string()][..],
            &["MX".to_string()][..],
        ]
    );
}

#[test]
fn paged_fetch_matches_a_single_fetch() {
    let conn = seeded_store();
    let reqs = [
        FetchRequest::default(),
        FetchRequest {
            exclude_region_identifiers: vec!["mx".to_string()],
            ..Default::default()
        },
        FetchRequest {
            region_identifiers: vec!["us".to_string()],
            ..Default::default()
        },
        FetchRequest {
            region_identifiers: vec!["CA".to_string(), "MX".to_string()],
            last_fetch_response_key_timestamp: 110,
            ..Default::default()
        },
    ];

    for req in reqs {
        let whole = fetch(&Never, req.clone(), |c| iterate_infections(&conn, c, 2), UNTIL).unwrap();
        let mut expected = keys(&whole);
        expected.sort();

        for per_call in [1, 2, 3] {
            let slices = fetch_in_slices(&conn, req.clone(), per_call);
            assert!(slices[..slices.len() - 1].iter().all(|r| r.partial_response));

            let mut got: Vec<String> = slices.iter().flat_map(keys).collect();
            let unique: HashSet<&String> = got.iter().collect();
            assert_eq!(unique.len(), got.len(), "duplicate keys for {req:?}");
            got.sort();
            assert_eq!(got, expected, "per_call={per_call} req={req:?}");

            let watermark = slices
                .iter()
                .map(|r| r.fetch_response_key_timestamp)
                .max()
                .unwrap();
            assert_eq!(watermark, whole.fetch_response_key_timestamp);
        }
    }
}

#[test]
fn since_is_exclusive() {
    let conn = seeded_store();
    let req = FetchRequest {
        last_fetch_response_key_timestamp: 130,
        ..Default::default()
    };

    let resp = fetch(&Never, req, |c| iterate_infections(&conn, c, 10), UNTIL).unwrap();

    assert_eq!(keys(&resp), vec!["us-ca", "mx-2"]);
}

#[test]
fn deadline_before_first_record_resumes_from_the_start() {
    let conn = seeded_store();
    let signal = StopAfterPolls::new(0, StopReason::DeadlineExceeded);

    let first = fetch(
        &signal,
        FetchRequest::default(),
        |c| iterate_infections(&conn, c, 10),
        UNTIL,
    )
    .unwrap();
    assert!(first.partial_response);
    assert!(first.response.is_empty());
    assert!(!first.next_fetch_token.is_empty());

    let resumed = FetchRequest {
        next_fetch_token: first.next_fetch_token,
        ..Default::default()
    };
    let rest = fetch(&Never, resumed, |c| iterate_infections(&conn, c, 10), UNTIL).unwrap();
    assert_eq!(keys(&rest).len(), 6);
}

#[test]
fn foreign_token_is_a_query_error() {
    let conn = seeded_store();
    let req = FetchRequest {
        next_fetch_token: "not a cursor".to_string(),
        ..Default::default()
    };

    let err = fetch(&Never, req, |c| iterate_infections(&conn, c, 10), UNTIL).unwrap_err();

    assert!(matches!(err, FetchError::Query { .. }), "got {err:?}");
}

#[test]
fn undecodable_rows_are_skipped_and_never_block_resumption() {
    let conn = Connection::open_in_memory().unwrap();
    run_migrations(&conn).unwrap();
    insert_infection(&conn, &record("good-1", &["US"], 10)).unwrap();
    conn.execute_batch(
        "INSERT INTO infections (key_id, diagnosis_key, regions_json, interval_number, interval_count, created_at)
         VALUES ('bad-json', x'01', 'not json', 1, 1, 20);
         INSERT INTO infections (key_id, diagnosis_key, regions_json, diagnosis_status, interval_number, interval_count, created_at)
         VALUES ('huge-status', x'01', '[\"US\"]', 9999999999, 1, 1, 25);
         INSERT INTO infections (key_id, diagnosis_key, regions_json, interval_number, interval_count, created_at)
         VALUES ('huge-interval', x'01', '[\"US\"]', 9999999999, 1, 27);",
    )
    .unwrap();
    insert_infection(&conn, &record("good-2", &["US"], 30)).unwrap();

    let whole = fetch(
        &Never,
        FetchRequest::default(),
        |c| iterate_infections(&conn, c, 2),
        UNTIL,
    )
    .unwrap();
    assert!(!whole.partial_response);
    assert_eq!(keys(&whole), vec!["good-1", "good-2"]);
    assert_eq!(whole.fetch_response_key_timestamp, 30);

    let slices = fetch_in_slices(&conn, FetchRequest::default(), 1);
    let got: Vec<String> = slices.iter().flat_map(keys).collect();
    assert_eq!(got, vec!["good-1", "good-2"]);
}
