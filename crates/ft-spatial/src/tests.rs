//! Unit tests for ft-spatial.
//!
//! All tests use hand-written coordinates so they run without any external
//! service.

#[cfg(test)]
mod helpers {
    use ft_core::Waypoint;

    use crate::Route;

    /// Three points heading north then east, roughly 111 km per hop.
    pub fn dogleg() -> Route {
        Route::new(vec![
            Waypoint::new(0.0, 0.0),
            Waypoint::new(1.0, 0.0),
            Waypoint::new(1.0, 1.0),
        ])
        .unwrap()
    }
}

// ── Route geometry ────────────────────────────────────────────────────────────

#[cfg(test)]
mod route {
    use ft_core::Waypoint;

    use crate::{Route, SpatialError, cumulative_distances, position_at_progress};

    #[test]
    fn rejects_short_routes() {
        assert!(matches!(Route::new(vec![]), Err(SpatialError::TooFewPoints(0))));
        assert!(matches!(
            Route::new(vec![Waypoint::new(1.0, 1.0)]),
            Err(SpatialError::TooFewPoints(1))
        ));
        assert!(position_at_progress(&[Waypoint::new(1.0, 1.0)], 0.5).is_err());
        assert!(position_at_progress(&[], 0.5).is_err());
    }

    #[test]
    fn rejects_invalid_points() {
        let r = Route::new(vec![Waypoint::new(0.0, 0.0), Waypoint::new(91.0, 0.0)]);
        assert!(matches!(r, Err(SpatialError::InvalidPoint(_))));
    }

    #[test]
    fn cumulative_is_prefix_sum() {
        let route = super::helpers::dogleg();
        let cum = route.cumulative_km();
        assert_eq!(cum[0], 0.0);
        assert!(cum.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(route.total_km(), cum[2]);
        let hop = Waypoint::new(0.0, 0.0).distance_km(Waypoint::new(1.0, 0.0));
        assert!((cum[1] - hop).abs() < 1e-9);
        assert!(cumulative_distances(&[]).is_empty());
    }

    #[test]
    fn endpoints_at_zero_and_one() {
        let route = super::helpers::dogleg();
        let start = route.position_at_progress(0.0);
        assert_eq!(start.position, route.origin());
        assert_eq!(start.covered_km, 0.0);
        assert_eq!(start.remaining_km, route.total_km());

        let end = route.position_at_progress(1.0);
        assert_eq!(end.position, route.destination());
        assert_eq!(end.remaining_km, 0.0);
        // Bearing of the last segment (due east).
        assert!((end.bearing - 90.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_progress_clamps() {
        let route = super::helpers::dogleg();
        assert_eq!(route.position_at_progress(-0.5).position, route.origin());
        assert_eq!(route.position_at_progress(3.0).position, route.destination());
    }

    #[test]
    fn midpoint_lands_on_the_corner() {
        // Both hops are ~equal length, so half way is near the corner.
        let route = super::helpers::dogleg();
        let mid = route.position_at_progress(0.5);
        assert!(mid.position.distance_km(Waypoint::new(1.0, 0.0)) < 1.0);
        assert!((mid.covered_km + mid.remaining_km - route.total_km()).abs() < 1e-9);
    }

    #[test]
    fn quarter_is_on_first_segment() {
        let route = super::helpers::dogleg();
        let q = route.position_at_progress(0.25);
        assert!(q.position.lng.abs() < 1e-12);
        assert!(q.position.lat > 0.4 && q.position.lat < 0.6);
        assert!(q.bearing.abs() < 1e-9, "heading north");
    }

    #[test]
    fn remaining_from_segment_point() {
        let route = super::helpers::dogleg();
        let p = route.point_in_segment(0, 0.5);
        let remaining = route.remaining_km_from(0, p);
        let expected = p.distance_km(Waypoint::new(1.0, 0.0)) + (route.total_km() - route.cumulative_km()[1]);
        assert!((remaining - expected).abs() < 1e-9);
        assert!(route.remaining_km_from(1, route.destination()).abs() < 1e-9);
    }

    #[test]
    fn degenerate_zero_length_route() {
        let p = Waypoint::new(5.0, 5.0);
        let route = Route::new(vec![p, p]).unwrap();
        assert_eq!(route.total_km(), 0.0);
        assert_eq!(route.position_at_progress(0.5).position, p);
    }
}

// ── RouteBuilder ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod builder {
    use ft_core::{RoutingConfig, ShipmentId, Waypoint};

    use crate::{RouteBuilder, SpatialError, Stop, StopKind};

    fn builder() -> RouteBuilder {
        RouteBuilder::new(RoutingConfig::default())
    }

    fn id() -> ShipmentId {
        ShipmentId::from("SHP-1")
    }

    #[test]
    fn short_hop_is_straight() {
        let a = Waypoint::new(40.70, -74.00);
        let b = Waypoint::new(40.80, -73.90); // ~14 km
        let route = builder().build(&id(), a, b, &[], None).unwrap();
        assert_eq!(route.waypoints(), &[a, b]);
        assert!((route.total_km() - a.distance_km(b)).abs() < 1e-9);
    }

    #[test]
    fn long_hop_curves_but_keeps_endpoints() {
        let a = Waypoint::new(40.7128, -74.0060); // New York
        let b = Waypoint::new(41.8781, -87.6298); // Chicago
        let route = builder().build(&id(), a, b, &[], None).unwrap();
        assert_eq!(route.point_count(), RoutingConfig::default().points_per_leg);
        assert_eq!(route.origin(), a);
        assert_eq!(route.destination(), b);
        // The bulge makes the polyline longer than the straight line, but
        // not absurdly so.
        let straight = a.distance_km(b);
        assert!(route.total_km() > straight);
        assert!(route.total_km() < straight * 1.1);
    }

    #[test]
    fn curve_is_deterministic_per_shipment() {
        let a = Waypoint::new(40.0, -74.0);
        let b = Waypoint::new(35.0, -80.0);
        let r1 = builder().build(&id(), a, b, &[], None).unwrap();
        let r2 = builder().build(&id(), a, b, &[], None).unwrap();
        assert_eq!(r1, r2);
    }

    #[test]
    fn bulge_shrinks_towards_threshold() {
        let cfg = RoutingConfig::default();
        let b = builder();
        let from = Waypoint::new(0.0, 0.0);
        // Just past the threshold: offset should be tiny.
        let near = Waypoint::new(0.0, (cfg.curve_threshold_km + 1.0) / 111.195);
        let mut rng = ft_core::RouteRng::from_seed(1);
        let leg = b.synthesize_leg(from, near, &mut rng);
        let max_offset = leg.iter().map(|p| p.lat.abs()).fold(0.0, f64::max);
        assert!(max_offset * 111.195 < 0.1, "offset {max_offset}");
    }

    #[test]
    fn road_geometry_used_verbatim() {
        let road = vec![
            Waypoint::new(0.0, 0.0),
            Waypoint::new(0.5, 0.2),
            Waypoint::new(1.0, 0.0),
        ];
        let route = builder()
            .build(&id(), Waypoint::new(0.0, 0.0), Waypoint::new(1.0, 0.0), &[], Some(road.clone()))
            .unwrap();
        assert_eq!(route.waypoints(), road.as_slice());
    }

    #[test]
    fn short_road_geometry_falls_back() {
        let a = Waypoint::new(0.0, 0.0);
        let b = Waypoint::new(0.1, 0.0);
        let route = builder().build(&id(), a, b, &[], Some(vec![a])).unwrap();
        assert_eq!(route.waypoints(), &[a, b]);
    }

    #[test]
    fn stops_are_ordered_by_kind() {
        let origin = Waypoint::new(0.0, 0.0);
        let dest = Waypoint::new(0.0, 0.5);
        let wp = Waypoint::new(0.0, 0.1);
        let held = Waypoint::new(0.0, 0.2);
        let released = Waypoint::new(0.0, 0.3);
        let stops = [
            Stop::new(StopKind::Clearance, released),
            Stop::new(StopKind::Delivery, dest),
            Stop::new(StopKind::Waypoint, wp),
            Stop::new(StopKind::Pickup, origin),
        ];
        let route = builder().build(&id(), origin, dest, &stops, None).unwrap();
        // Pickup and delivery duplicate the endpoints and collapse away.
        assert_eq!(route.waypoints(), &[origin, wp, released, dest]);

        let stops = [
            Stop::new(StopKind::Interception, held),
            Stop::new(StopKind::Clearance, released),
        ];
        let route = builder().build(&id(), origin, dest, &stops, None).unwrap();
        assert_eq!(route.waypoints(), &[origin, held, released, dest]);
    }

    #[test]
    fn identical_endpoints_rejected() {
        let p = Waypoint::new(10.0, 10.0);
        let r = builder().build(&id(), p, p, &[], None);
        assert!(matches!(r, Err(SpatialError::TooFewPoints(1))));
    }
}

// ── Gazetteer ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod gazetteer {
    use std::io::{Cursor, Write};

    use ft_core::Waypoint;

    use crate::{Gazetteer, Geocoder, SpatialError};

    const PLACES: &str = "\
name,lat,lng\n\
New York,40.7128,-74.0060\n\
Philadelphia,39.9526,-75.1652\n\
Chicago,41.8781,-87.6298\n\
";

    fn gaz() -> Gazetteer {
        Gazetteer::from_reader(Cursor::new(PLACES)).unwrap()
    }

    #[test]
    fn loads_all_rows() {
        assert_eq!(gaz().len(), 3);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let g = gaz();
        assert_eq!(g.lookup("  chicago "), Some(Waypoint::new(41.8781, -87.6298)));
        assert_eq!(g.lookup("Boston"), None);
    }

    #[test]
    fn bad_rows_rejected() {
        let bad = "name,lat,lng\nNowhere,123.0,0.0\n";
        assert!(matches!(Gazetteer::from_reader(Cursor::new(bad)), Err(SpatialError::Parse(_))));
        let garbled = "name,lat,lng\nX,abc,1\n";
        assert!(Gazetteer::from_reader(Cursor::new(garbled)).is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.csv");
        std::fs::File::create(&path).unwrap().write_all(PLACES.as_bytes()).unwrap();
        assert_eq!(Gazetteer::load_csv(&path).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn resolve_names_and_coordinates() {
        let g = gaz();
        assert_eq!(g.resolve("New York").await.unwrap(), Waypoint::new(40.7128, -74.0060));
        assert_eq!(g.resolve("39.0, -75.5").await.unwrap(), Waypoint::new(39.0, -75.5));
        assert!(matches!(g.resolve("Atlantis").await, Err(SpatialError::UnknownPlace(_))));
    }

    #[tokio::test]
    async fn reverse_names_nearby_place() {
        let g = gaz();
        assert_eq!(g.reverse(Waypoint::new(40.7128, -74.0060)).await.unwrap(), "New York");
        assert_eq!(g.reverse(Waypoint::new(40.0, -75.0)).await.unwrap(), "near Philadelphia");
        // Mid-Atlantic: nothing within the radius.
        assert!(g.reverse(Waypoint::new(35.0, -50.0)).await.is_err());
    }
}
