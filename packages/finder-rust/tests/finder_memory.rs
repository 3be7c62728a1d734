//! End-to-end finder behavior against the in-memory store.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use viewfind::{
    Conditions, Entity, Finder, MemoryStore, QueryError, StoreError, ViewOptions, ViewStore,
};

#[derive(Debug, Deserialize, PartialEq)]
struct Track {
    album_id: String,
    title: String,
    position: i64,
    #[serde(default)]
    genre: Option<String>,
}

impl Entity for Track {
    fn type_name() -> &'static str {
        "Track"
    }

    fn default_order() -> &'static [&'static str] {
        &["position"]
    }
}

#[derive(Debug, Deserialize)]
struct Playlist {
    name: String,
}

impl Entity for Playlist {
    fn type_name() -> &'static str {
        "Music::Playlist"
    }
}

async fn library() -> (Arc<MemoryStore>, Finder) {
    let store = Arc::new(MemoryStore::new());
    let tracks = [
        ("123", "Intro", 1, Some("ambient")),
        ("123", "Theme", 2, Some("rock")),
        ("123", "Outro", 3, None),
        ("456", "Opening", 1, Some("rock")),
        ("456", "Closing", 2, Some("jazz")),
    ];
    for (album_id, title, position, genre) in tracks {
        let mut doc = json!({
            "type": "Track",
            "album_id": album_id,
            "title": title,
            "position": position,
        });
        if let Some(genre) = genre {
            doc["genre"] = json!(genre);
        }
        store.save_document(&doc).await.unwrap();
    }
    let finder = Finder::new(store.clone());
    (store, finder)
}

fn titles(tracks: &[Track]) -> Vec<&str> {
    tracks.iter().map(|t| t.title.as_str()).collect()
}

#[tokio::test]
async fn album_tracks_in_position_order() {
    let (store, finder) = library().await;
    let tracks: Vec<Track> = finder
        .find(
            &Conditions::new().with("album_id", "123"),
            ViewOptions::new().order(["album_id", "position"]),
        )
        .await
        .unwrap();

    assert_eq!(titles(&tracks), vec!["Intro", "Theme", "Outro"]);
    assert!(tracks.iter().all(|t| t.album_id == "123"));
    let design = store.get_document("_design/track").await.unwrap();
    assert!(design["views"]["by_album_id_and_position"].is_object());
}

#[tokio::test]
async fn leading_order_field_is_scanned_before_conditions() {
    let (_, finder) = library().await;
    // The default order puts `position` first in the key, so the open
    // position range spans every album.
    let tracks: Vec<Track> = finder
        .find(&Conditions::new().with("album_id", "123"), ViewOptions::new())
        .await
        .unwrap();
    let positions: Vec<i64> = tracks.iter().map(|t| t.position).collect();
    assert_eq!(positions, vec![1, 1, 2, 2, 3]);
}

#[tokio::test]
async fn range_within_an_album() {
    let (_, finder) = library().await;
    let conditions = Conditions::new()
        .with("position", 1..=2)
        .with("album_id", "123");
    let tracks: Vec<Track> = finder
        .find(&conditions, ViewOptions::new().order(["album_id", "position"]))
        .await
        .unwrap();
    assert_eq!(titles(&tracks), vec!["Intro", "Theme"]);
}

#[tokio::test]
async fn any_of_genres() {
    let (_, finder) = library().await;
    let tracks: Vec<Track> = finder
        .find(
            &Conditions::new().with("genre", vec!["jazz", "ambient"]),
            ViewOptions::new().order(Vec::<String>::new()),
        )
        .await
        .unwrap();
    assert_eq!(titles(&tracks), vec!["Closing", "Intro"]);
}

#[tokio::test]
async fn missing_field_sorts_first() {
    let (_, finder) = library().await;
    let tracks: Vec<Track> = finder
        .find(&Conditions::new(), ViewOptions::new().order(["genre"]))
        .await
        .unwrap();
    assert_eq!(tracks[0].title, "Outro");
    assert_eq!(tracks[0].genre, None);
    assert_eq!(tracks.len(), 5);
}

#[tokio::test]
async fn first_last_and_count_per_album() {
    let (_, finder) = library().await;
    let album = Conditions::new().with("album_id", "456");
    let by_position = || ViewOptions::new().order(["album_id", "position"]);

    let first: Option<Track> = finder.first(&album, by_position()).await.unwrap();
    let last: Option<Track> = finder.last(&album, by_position()).await.unwrap();
    let count = finder.count::<Track>(&album).await.unwrap();

    assert_eq!(first.unwrap().title, "Opening");
    let last = last.unwrap();
    assert_eq!((last.title.as_str(), last.position), ("Closing", 2));
    assert_eq!(count, 2);
}

#[tokio::test]
async fn skip_and_limit_page_through_results() {
    let (_, finder) = library().await;
    let page: Vec<Track> = finder
        .find(&Conditions::new(), ViewOptions::new().order(["title"]).skip(1).limit(2))
        .await
        .unwrap();
    assert_eq!(titles(&page), vec!["Intro", "Opening"]);
}

#[tokio::test]
async fn namespaced_type_gets_nested_design_name() {
    let store = Arc::new(MemoryStore::new());
    store
        .save_document(&json!({ "type": "Music::Playlist", "name": "Road trip" }))
        .await
        .unwrap();
    let finder = Finder::new(store.clone());

    let found: Vec<Playlist> = finder
        .find(&Conditions::new().with("name", "Road trip"), ViewOptions::new())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Road trip");
    assert!(store.get_document("_design/music/playlist").await.is_ok());
}

#[tokio::test]
async fn empty_store_counts_zero_and_finds_nothing() {
    let store = Arc::new(MemoryStore::new());
    let finder = Finder::new(store.clone());

    assert_eq!(finder.count::<Track>(&Conditions::new()).await.unwrap(), 0);
    let tracks: Vec<Track> = finder.find(&Conditions::new(), ViewOptions::new()).await.unwrap();
    assert!(tracks.is_empty());
    assert_eq!(store.design_writes(), 2);
}

#[tokio::test]
async fn concurrent_first_queries_for_one_view() {
    let (store, finder) = library().await;
    let album = Conditions::new().with("album_id", "123");
    let by_position = || ViewOptions::new().order(["album_id", "position"]);

    let (a, b) = tokio::join!(
        finder.find::<Track>(&album, by_position()),
        finder.find::<Track>(&album, by_position()),
    );

    // Whichever call loses the revision race may surface the conflict.
    for result in [a, b] {
        match result {
            Ok(tracks) => assert_eq!(tracks.len(), 3),
            Err(QueryError::Store(StoreError::Conflict { .. })) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(store.design_writes() >= 1);
}
