use super::*;
use crate::geo::{geo_to_screen, GeoPoint, ScreenPoint, ViewTransform, ZOOM_MAX};
use crate::map::{EntityCategory, EntityId, EntityRegistry, ParcelId, PointKind, RecordKind};
use crate::test_support::{placed, square_parcel, with_bridge, with_building, with_canal};

const SOUTH: f64 = 45.4370;
const WEST: f64 = 12.3320;
const SIZE: f64 = 0.001;

fn building_slot() -> GeoPoint {
    GeoPoint::new(45.4375, 12.3325)
}

fn canal_slot() -> GeoPoint {
    GeoPoint::new(45.43701, 12.3322)
}

fn bridge_slot() -> GeoPoint {
    GeoPoint::new(45.43799, 12.3328)
}

fn sample_index() -> SpatialIndex {
    let parcel = square_parcel("p1", SOUTH, WEST, SIZE);
    let parcel = with_building(parcel, "b1", building_slot());
    let parcel = with_canal(parcel, "c1", canal_slot());
    let parcel = with_bridge(parcel, "br1", bridge_slot(), None);
    SpatialIndex::build(&[parcel])
}

fn zoomed_view() -> ViewTransform {
    ViewTransform::new(800, 600).with_scale(ZOOM_MAX)
}

fn click_at(geo: GeoPoint, view: &ViewTransform) -> ScreenPoint {
    geo_to_screen(geo, view)
}

#[test]
fn parcel_containment_uses_ring_and_counts_boundary_inside() {
    let index = sample_index();
    assert!(index.parcel_at(GeoPoint::new(45.4373, 12.3323)).is_some());
    assert!(index.parcel_at(GeoPoint::new(45.4390, 12.3323)).is_none());
    assert!(index.parcel_at(GeoPoint::new(SOUTH, 12.3324)).is_some());
}

#[test]
fn click_on_building_slot_selects_it() {
    let index = sample_index();
    let registry = EntityRegistry::default();
    let view = zoomed_view();

    let hit = HitTester::default().resolve(
        click_at(building_slot(), &view),
        &view,
        &index,
        &registry,
        &[],
    );
    match hit {
        Some(SelectedEntity::Point { point_id, kind, .. }) => {
            assert_eq!(point_id, "b1");
            assert_eq!(kind, PointKind::Building);
        }
        other => panic!("expected building slot, got {other:?}"),
    }
}

#[test]
fn occupied_building_slot_falls_through_to_parcel() {
    let index = sample_index();
    let registry = EntityRegistry::new([placed(
        "house",
        EntityCategory::Building,
        building_slot(),
        true,
    )]);
    let view = zoomed_view();

    let hit = HitTester::default().resolve(
        click_at(building_slot(), &view),
        &view,
        &index,
        &registry,
        &[],
    );
    assert_eq!(hit, Some(SelectedEntity::Parcel(ParcelId::new("p1"))));
}

#[test]
fn canal_slot_is_only_skipped_for_constructed_docks() {
    let index = sample_index();
    let view = zoomed_view();
    let click = click_at(canal_slot(), &view);

    let building_there =
        EntityRegistry::new([placed("shed", EntityCategory::Building, canal_slot(), true)]);
    let hit = HitTester::default().resolve(click, &view, &index, &building_there, &[]);
    assert!(matches!(
        hit,
        Some(SelectedEntity::Point {
            kind: PointKind::Canal,
            ..
        })
    ));

    let dock_there =
        EntityRegistry::new([placed("dock", EntityCategory::Dock, canal_slot(), true)]);
    let hit = HitTester::default().resolve(click, &view, &index, &dock_there, &[]);
    assert_eq!(hit, Some(SelectedEntity::Parcel(ParcelId::new("p1"))));

    let planned_dock =
        EntityRegistry::new([placed("dock", EntityCategory::Dock, canal_slot(), false)]);
    let hit = HitTester::default().resolve(click, &view, &index, &planned_dock, &[]);
    assert!(matches!(hit, Some(SelectedEntity::Point { .. })));
}

#[test]
fn bridge_slot_is_selected_even_when_a_bridge_is_built() {
    let index = sample_index();
    let registry =
        EntityRegistry::new([placed("bridge", EntityCategory::Bridge, bridge_slot(), true)]);
    let view = zoomed_view();
    let hit = HitTester::default().resolve(
        click_at(bridge_slot(), &view),
        &view,
        &index,
        &registry,
        &[],
    );
    assert!(matches!(
        hit,
        Some(SelectedEntity::Point {
            kind: PointKind::Bridge,
            ..
        })
    ));
}

#[test]
fn marker_wins_over_slot_and_stale_marker_is_ignored() {
    let index = sample_index();
    let registry = EntityRegistry::new([placed(
        "house",
        EntityCategory::Building,
        GeoPoint::new(45.4376, 12.3326),
        true,
    )]);
    let view = zoomed_view();
    let click = click_at(building_slot(), &view);
    let live = EntityMarker {
        entity_id: EntityId::new("house"),
        category: EntityCategory::Building,
        position: building_slot(),
        radius_px: 12.0,
        orientation: None,
    };
    let stale = EntityMarker {
        entity_id: EntityId::new("demolished"),
        ..live.clone()
    };

    let hit = HitTester::default().resolve(click, &view, &index, &registry, &[live]);
    assert_eq!(
        hit,
        Some(SelectedEntity::Marker {
            entity_id: EntityId::new("house"),
            category: EntityCategory::Building,
        })
    );

    let hit = HitTester::default().resolve(click, &view, &index, &registry, &[stale]);
    assert!(matches!(
        hit,
        Some(SelectedEntity::Point {
            kind: PointKind::Building,
            ..
        })
    ));
}

#[test]
fn click_on_open_water_selects_nothing() {
    let index = sample_index();
    let registry = EntityRegistry::default();
    let view = zoomed_view();
    let hit = HitTester::default().resolve(
        click_at(GeoPoint::new(45.4395, 12.3345), &view),
        &view,
        &index,
        &registry,
        &[],
    );
    assert_eq!(hit, None);
}

#[test]
fn equidistant_slots_resolve_to_first_in_parcel_order() {
    let parcel = square_parcel("p1", SOUTH, WEST, SIZE);
    let shared = GeoPoint::new(45.43750, 12.33250);
    let parcel = with_building(parcel, "first", shared);
    let parcel = with_building(parcel, "second", shared);
    let index = SpatialIndex::build(&[parcel]);
    let registry = EntityRegistry::default();

    let slot = index
        .nearest_point(
            GeoPoint::new(45.43751, 12.33250),
            MAX_POINT_HIT_DEG,
            PointKind::Building,
            &registry,
        )
        .expect("slot");
    assert_eq!(slot.point_id, "first");
}

#[test]
fn oversized_threshold_is_capped_to_the_point_hit_radius() {
    let index = sample_index();
    let registry = EntityRegistry::default();
    // About 2e-4 degrees north of the building slot.
    let near = GeoPoint::new(45.4377, 12.3325);

    let capped = index.nearest_point(near, 1.0e6, PointKind::Building, &registry);
    assert_eq!(capped, None);
    let slot = index
        .nearest_point(
            GeoPoint::new(45.43755, 12.3325),
            f64::MAX,
            PointKind::Building,
            &registry,
        )
        .expect("slot within the cap");
    assert_eq!(slot.point_id, "b1");
}

#[test]
fn malformed_parcels_and_slots_are_excluded_not_fatal() {
    let mut degenerate = square_parcel("flat", SOUTH, WEST, SIZE);
    degenerate.boundary.truncate(2);
    let broken_slot = with_building(
        square_parcel("ok", SOUTH + 0.01, WEST, SIZE),
        "nan",
        GeoPoint::new(f64::NAN, WEST),
    );

    let index = SpatialIndex::build(&[degenerate, broken_slot]);
    assert_eq!(index.parcel_count(), 1);
    assert!(index.slots().is_empty());
    let kinds: Vec<_> = index.skipped().iter().map(|record| record.kind).collect();
    assert_eq!(kinds, vec![RecordKind::Parcel, RecordKind::BuildingPoint]);
}

#[test]
fn hit_threshold_shrinks_with_zoom_and_is_capped() {
    assert_eq!(hit_threshold_deg(8.0, 1.0), MAX_POINT_HIT_DEG);
    let zoomed = hit_threshold_deg(8.0, 16.0);
    assert!((zoomed - 2.5e-5).abs() < 1e-12);
    assert_eq!(hit_threshold_deg(f64::NAN, 3.0), MAX_POINT_HIT_DEG);
}
