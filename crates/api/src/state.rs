use imhere_config::Settings;
use imhere_services::{
    AuthService, DocumentStore, OverviewService,
    dao::{room::RoomDao, user::UserDao},
    geo::{self, EtaModel, FallbackFix, GeoError, Geocoder, NominatimGeocoder, OsrmRouter, RoutingService},
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<dyn DocumentStore>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserDao>,
    pub rooms: Arc<RoomDao>,
    pub overview: Arc<OverviewService>,
    pub geocoder: Arc<dyn Geocoder>,
    /// Stand-in position for members without a usable fix.
    pub fallback: FallbackFix,
}

impl AppState {
    /// Wires the OSM-backed geocoder and router from settings.
    pub fn new(store: Arc<dyn DocumentStore>, settings: Settings) -> Result<Self, GeoError> {
        let client = geo::http_client(
            &settings.geo.user_agent,
            Duration::from_secs(settings.geo.request_timeout_secs),
        )?;
        let geocoder = Arc::new(NominatimGeocoder::new(
            client.clone(),
            settings.geo.nominatim_url.clone(),
        ));
        let router = Arc::new(OsrmRouter::new(client, settings.geo.osrm_url.clone()));
        Ok(Self::with_collaborators(store, settings, geocoder, router))
    }

    pub fn with_collaborators(
        store: Arc<dyn DocumentStore>,
        settings: Settings,
        geocoder: Arc<dyn Geocoder>,
        router: Arc<dyn RoutingService>,
    ) -> Self {
        let watch_buffer = settings.store.watch_buffer;
        let fallback = FallbackFix::from_settings(&settings.geo);
        let auth = Arc::new(AuthService::new(settings.jwt.clone()));
        let users = Arc::new(UserDao::new(store.clone()));
        let rooms = Arc::new(RoomDao::new(
            store.clone(),
            settings.rooms.clone(),
            watch_buffer,
        ));
        let overview = Arc::new(OverviewService::new(
            rooms.clone(),
            router,
            EtaModel::from_settings(&settings.geo.eta),
            EtaModel::flat(settings.geo.eta.route_speed_kmh),
            fallback,
            watch_buffer,
        ));

        Self {
            settings,
            store,
            auth,
            users,
            rooms,
            overview,
            geocoder,
            fallback,
        }
    }
}
