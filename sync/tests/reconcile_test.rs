//! Reconciler behaviour against an in-memory remote store.

mod common;

use common::Harness;
use groundbook_engine::{Booking, BookingStatus, Entity, EntityKind, Favorite, Review, Venue};
use groundbook_sync::store::{Removal, StoreError};
use groundbook_sync::{RemoteError, SyncError, SyncOutcome};
use serde_json::json;

fn booking(venue_id: &str, time: &str) -> Booking {
    Booking::builder("u-1", venue_id)
        .slot("2024-06-10", time, 1)
        .build()
}

#[tokio::test]
async fn online_write_is_pushed_and_marked_synced() {
    let h = Harness::online().await;

    let outcome = h.sync.sync_entity(booking("v-1", "10:00")).await.unwrap();
    assert!(outcome.is_synced());
    let id = outcome.entity().id.clone();

    let stored: Booking = h.store.get(&id).await.unwrap().unwrap();
    assert!(stored.synced);
    assert_eq!(h.remote.creates(), 1);
    assert!(h.remote.stored(EntityKind::Booking, &id).is_some());
}

#[tokio::test]
async fn offline_write_is_durable_and_pushed_later() {
    let h = Harness::offline().await;

    let outcome = h.sync.sync_entity(booking("v-1", "10:00")).await.unwrap();
    assert!(matches!(outcome, SyncOutcome::LocalOnly(_)));
    assert_eq!(h.remote.creates(), 0);
    assert_eq!(h.store.get_unsynced::<Booking>().await.unwrap().len(), 1);

    let summary = h.sync.sync_all().await;
    assert!(summary.skipped_offline);

    h.go_online();
    let summary = h.sync.sync_all().await;
    assert_eq!(summary.synced_bookings, 1);
    assert_eq!(summary.errors, 0);
    assert!(h.store.get_unsynced::<Booking>().await.unwrap().is_empty());
}

#[tokio::test]
async fn sync_all_is_idempotent() {
    let h = Harness::offline().await;
    for time in ["08:00", "10:00", "12:00"] {
        h.sync.sync_entity(booking("v-1", time)).await.unwrap();
    }
    h.go_online();

    let first = h.sync.sync_all().await;
    let second = h.sync.sync_all().await;

    assert_eq!(first.synced_bookings, 3);
    assert_eq!(second.total_synced(), 0);
    assert_eq!(h.remote.creates(), 3);
    assert_eq!(h.remote.count(EntityKind::Booking), 3);
}

#[tokio::test]
async fn one_rejection_does_not_block_the_rest() {
    let h = Harness::offline().await;
    let mut ids = Vec::new();
    for time in ["08:00", "09:00", "10:00", "11:00", "12:00"] {
        let outcome = h.sync.sync_entity(booking("v-1", time)).await.unwrap();
        ids.push(outcome.into_entity().id);
    }
    h.remote.reject(&ids[2]);
    h.go_online();

    let summary = h.sync.sync_all().await;
    assert_eq!(summary.synced_bookings, 4);
    assert_eq!(summary.errors, 1);

    let pending = h.store.get_unsynced::<Booking>().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, ids[2]);
}

#[tokio::test]
async fn rejection_is_distinct_from_transport_failure() {
    let h = Harness::online().await;
    let mut venue = Venue::new("Riverside Turf", "Pune", 20.0);
    venue.id = "v-1".into();

    h.remote.reject("v-1");
    let err = h.sync.sync_entity(venue.clone()).await.unwrap_err();
    assert!(matches!(err, SyncError::Remote(ref e) if e.status() == Some(422)));
    assert!(!err.is_retryable());

    let h = Harness::online().await;
    h.remote.set_unreachable(true);
    let err = h.sync.sync_entity(venue).await.unwrap_err();
    assert!(err.is_retryable());

    // The local write survives either way.
    let stored: Venue = h.store.get("v-1").await.unwrap().unwrap();
    assert!(!stored.synced);
}

#[tokio::test]
async fn second_push_of_a_known_record_is_an_update() {
    let h = Harness::online().await;
    let outcome = h
        .sync
        .sync_entity(Venue::new("Riverside Turf", "Pune", 20.0))
        .await
        .unwrap();

    let mut venue = outcome.into_entity();
    venue.set_price(25.0);
    h.sync.sync_entity(venue.clone()).await.unwrap();

    assert_eq!(h.remote.creates(), 1);
    assert_eq!(h.remote.updates(), 1);
    let remote = h.remote.stored(EntityKind::Venue, &venue.id).unwrap();
    assert_eq!(remote["pricePerHour"], 25.0);
}

#[tokio::test]
async fn server_assigned_id_replaces_the_local_one() {
    let h = Harness::online().await;
    h.remote.assign_ids();

    let outcome = h.sync.sync_entity(booking("v-1", "10:00")).await.unwrap();
    let server_id = outcome.entity().id().to_string();
    assert_eq!(server_id, "srv-1");

    let all = h.store.list::<Booking>().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, "srv-1");
    assert!(all[0].synced);

    // Later edits go to the server's identity.
    let mut edited = all[0].clone();
    edited.status = BookingStatus::Confirmed;
    h.sync.sync_entity(edited).await.unwrap();
    assert_eq!(h.remote.creates(), 1);
    assert_eq!(h.remote.updates(), 1);
}

#[tokio::test]
async fn deleting_an_unpushed_record_never_reaches_the_remote() {
    let h = Harness::offline().await;
    let outcome = h.sync.sync_entity(booking("v-1", "10:00")).await.unwrap();
    let id = outcome.into_entity().id;

    h.sync.delete_entity::<Booking>(&id).await.unwrap();
    h.go_online();
    let summary = h.sync.sync_all().await;

    assert_eq!(summary.deleted, 0);
    assert_eq!(h.remote.creates(), 0);
    assert_eq!(h.remote.deletes(), 0);
}

#[tokio::test]
async fn offline_delete_of_a_pushed_record_is_replayed() {
    let h = Harness::online().await;
    let id = h
        .sync
        .sync_entity(booking("v-1", "10:00"))
        .await
        .unwrap()
        .into_entity()
        .id;

    h.go_offline();
    let outcome = h.sync.delete_entity::<Booking>(&id).await.unwrap();
    assert!(!outcome.is_synced());
    assert!(h.store.get::<Booking>(&id).await.unwrap().is_none());
    assert_eq!(
        h.store.pending_deletes(EntityKind::Booking).await.unwrap(),
        vec![id.clone()]
    );

    h.go_online();
    let summary = h.sync.sync_all().await;
    assert_eq!(summary.deleted, 1);
    assert!(h.remote.stored(EntityKind::Booking, &id).is_none());
    assert!(h.store.pending_deletes(EntityKind::Booking).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_already_gone_remotely_counts_as_done() {
    let h = Harness::online().await;
    let id = h
        .sync
        .sync_entity(booking("v-1", "10:00"))
        .await
        .unwrap()
        .into_entity()
        .id;

    h.go_offline();
    assert_eq!(
        h.store.delete::<Booking>(&id).await.unwrap(),
        Removal::Tombstoned
    );
    // Someone else removed it meanwhile.
    groundbook_sync::RemoteApi::delete(h.remote.as_ref(), EntityKind::Booking, &id)
        .await
        .unwrap();

    h.go_online();
    let summary = h.sync.sync_all().await;
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.errors, 0);
}

#[tokio::test]
async fn review_changes_reach_the_venue_rating() {
    let h = Harness::offline().await;
    let mut venue = Venue::new("Riverside Turf", "Pune", 20.0);
    venue.id = "v-1".into();
    h.sync.sync_entity(venue).await.unwrap();

    let first = Review::new("u-1", "v-1", "b-1", 4.0, "Good", 0).unwrap();
    let second = Review::new("u-2", "v-1", "b-2", 5.0, "Great", 0).unwrap();
    h.sync.sync_entity(first).await.unwrap();
    let second = h.sync.sync_entity(second).await.unwrap().into_entity();

    let venue: Venue = h.store.get("v-1").await.unwrap().unwrap();
    assert_eq!(venue.rating, 4.5);
    assert_eq!(venue.rating_display, "4.5");

    h.sync.delete_entity::<Review>(&second.id).await.unwrap();
    let venue: Venue = h.store.get("v-1").await.unwrap().unwrap();
    assert_eq!(venue.rating, 4.0);

    h.go_online();
    let summary = h.sync.sync_all().await;
    assert_eq!(summary.synced_venues, 1);
    assert_eq!(summary.synced_reviews, 1);
    let remote = h.remote.stored(EntityKind::Venue, "v-1").unwrap();
    assert_eq!(remote["rating"], 4.0);
}

#[tokio::test]
async fn moving_a_review_rerates_both_venues() {
    let h = Harness::offline().await;
    for id in ["v-1", "v-2"] {
        let mut venue = Venue::new("Turf", "Pune", 20.0);
        venue.id = id.into();
        h.sync.sync_entity(venue).await.unwrap();
    }
    let review = h
        .sync
        .sync_entity(Review::new("u-1", "v-1", "b-1", 4.0, "Good", 0).unwrap())
        .await
        .unwrap()
        .into_entity();

    let mut feed = h.store.subscribe();
    let mut moved = review.clone();
    moved.venue_id = "v-2".into();
    h.sync.sync_entity(moved).await.unwrap();

    let left: Venue = h.store.get("v-1").await.unwrap().unwrap();
    let joined: Venue = h.store.get("v-2").await.unwrap().unwrap();
    assert_eq!(left.rating, 0.0);
    assert_eq!(joined.rating, 4.0);

    let mut venues = Vec::new();
    while let Ok(change) = feed.try_recv() {
        if change.kind == EntityKind::Venue {
            venues.push(change.id);
        }
    }
    venues.sort();
    assert_eq!(venues, vec!["v-1".to_string(), "v-2".to_string()]);
}

#[tokio::test]
async fn out_of_range_review_is_rejected_before_saving() {
    let h = Harness::online().await;
    let mut venue = Venue::new("Turf", "Pune", 20.0);
    venue.id = "v-1".into();
    h.sync.sync_entity(venue).await.unwrap();

    let review: Review = serde_json::from_value(json!({
        "userId": "u-1",
        "venueId": "v-1",
        "bookingId": "b-1",
        "rating": 9.0
    }))
    .unwrap();
    let err = h.sync.sync_entity(review).await.unwrap_err();
    assert!(matches!(err, SyncError::Store(StoreError::Invalid(_))));
    assert!(!err.is_retryable());

    assert!(h.store.list::<Review>().await.unwrap().is_empty());
    assert_eq!(h.remote.count(EntityKind::Review), 0);
    let venue: Venue = h.store.get("v-1").await.unwrap().unwrap();
    assert_eq!(venue.rating, 0.0);
}

#[tokio::test]
async fn favorites_keep_their_derived_identity() {
    let h = Harness::online().await;
    h.remote.assign_ids();

    for id in ["", "fav-random"] {
        let favorite: Favorite = serde_json::from_value(json!({
            "id": id,
            "userId": "u-1",
            "venueId": "v-1"
        }))
        .unwrap();
        let saved = h.sync.sync_entity(favorite).await.unwrap().into_entity();
        assert_eq!(saved.id, "u-1_v-1");
    }

    let favorites = h.store.favorites_for_user("u-1").await.unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].id, Favorite::key("u-1", "v-1"));
    assert_eq!(h.remote.creates(), 1);
    assert_eq!(h.remote.updates(), 1);
}

#[tokio::test]
async fn unreadable_create_reply_is_not_created_twice() {
    let h = Harness::online().await;
    let mut venue = Venue::new("Riverside Turf", "Pune", 20.0);
    venue.id = "v-1".into();

    h.remote.garble_replies(true);
    let err = h.sync.sync_entity(venue).await.unwrap_err();
    assert!(matches!(err, SyncError::Remote(RemoteError::Decode(_))));
    let pending: Venue = h.store.get("v-1").await.unwrap().unwrap();
    assert!(!pending.synced);

    h.remote.garble_replies(false);
    let summary = h.sync.sync_all().await;
    assert_eq!(summary.synced_venues, 1);
    assert_eq!(h.remote.creates(), 1);
    assert_eq!(h.remote.updates(), 1);
    assert_eq!(h.remote.count(EntityKind::Venue), 1);
}

#[tokio::test]
async fn refresh_keeps_unsynced_local_changes() {
    let h = Harness::online().await;
    h.remote.seed(
        EntityKind::Venue,
        serde_json::json!({
            "id": "v-remote",
            "name": "Remote Arena",
            "location": "Delhi",
            "pricePerHour": 30.0
        }),
    );
    h.remote.seed(
        EntityKind::Venue,
        serde_json::json!({
            "id": "v-1",
            "name": "Server Name",
            "location": "Pune",
            "pricePerHour": 20.0
        }),
    );

    h.go_offline();
    let mut local = Venue::new("Local Name", "Pune", 20.0);
    local.id = "v-1".into();
    h.sync.sync_entity(local).await.unwrap();
    h.go_online();

    let pulled = h.sync.refresh::<Venue>().await.unwrap();
    assert_eq!(pulled, 1);

    let kept: Venue = h.store.get("v-1").await.unwrap().unwrap();
    assert_eq!(kept.name, "Local Name");
    assert!(!kept.synced);
    let fetched: Venue = h.store.get("v-remote").await.unwrap().unwrap();
    assert!(fetched.synced);
}
