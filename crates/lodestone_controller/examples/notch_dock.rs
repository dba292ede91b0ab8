//! Console walkthrough of one full attraction cycle.
//!
//! A stub render engine prints the commands it receives and `main` plays the
//! role of the animation system, acknowledging each command by calling the
//! matching completion. Run with `RUST_LOG=trace` to watch the controller's
//! internal decisions.

use std::sync::Arc;
use std::time::Duration;

use lodestone_controller::{
    AttractionConfig, AttractionController, AttractionPoint, GeometryProvider, Point, Rect,
    RenderEngine, Size, SnapshotHandle,
};

struct ConsoleRender;

impl RenderEngine for ConsoleRender {
    fn start_attraction_animation(
        &self,
        id: &str,
        from: Rect,
        to: AttractionPoint,
        snapshot: Option<SnapshotHandle>,
    ) {
        println!(
            "render: attract '{id}' from ({:.0}, {:.0}) into point ({:.0}, {:.0}), snapshot: {}",
            from.x(),
            from.y(),
            to.position.x,
            to.position.y,
            snapshot.is_some(),
        );
    }

    fn start_release_animation(
        &self,
        id: &str,
        from: Point,
        to: Rect,
        snapshot: Option<SnapshotHandle>,
    ) {
        println!(
            "render: release '{id}' from ({:.0}, {:.0}) back to ({:.0}, {:.0}), snapshot: {}",
            from.x,
            from.y,
            to.x(),
            to.y(),
            snapshot.is_some(),
        );
    }
}

/// A fixed notch centered at the top of a 400pt-wide screen
struct NotchGeometry;

impl GeometryProvider for NotchGeometry {
    fn default_geometry(&self) -> Option<AttractionConfig> {
        let notch = AttractionPoint::new(Point::new(200.0, 24.0), 160.0, 1.0).ok()?;
        AttractionConfig::from_points(vec![notch]).ok()
    }
}

fn main() -> lodestone_controller::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let controller = AttractionController::builder(Arc::new(ConsoleRender))
        .geometry_provider(Arc::new(NotchGeometry))
        .cooldown_window(Duration::from_millis(300))
        .on_attract(|id| println!("hook: '{id}' captured"))
        .on_release(|id| println!("hook: '{id}' let go"))
        .build();

    controller.register_item("music-widget", 1.0)?;
    let attracted = controller.observe_attracted("music-widget");
    let widget = Size::new(44.0, 44.0);

    println!("-- widget dragged near the notch --");
    controller.update_position("music-widget", true, widget, Point::new(178.0, 90.0));
    controller.scan_for_attraction();
    controller.on_attraction_animation_completed("music-widget");
    println!(
        "state: {:?}, attracted signal: {}",
        controller.item_state("music-widget"),
        attracted.get(),
    );

    println!("-- widget dragged down and away --");
    controller.update_position("music-widget", true, widget, Point::new(178.0, 200.0));
    controller.update_position("music-widget", true, widget, Point::new(178.0, 340.0));
    controller.scan_for_release();
    controller.on_release_animation_completed("music-widget");
    println!(
        "state: {:?}, attracted signal: {}",
        controller.item_state("music-widget"),
        attracted.get(),
    );

    println!("-- dragged right back: cool-down holds it --");
    controller.update_position("music-widget", true, widget, Point::new(178.0, 90.0));
    controller.scan_for_attraction();
    println!("state: {:?}", controller.item_state("music-widget"));

    std::thread::sleep(Duration::from_millis(350));
    println!("-- cool-down expired, near the notch again --");
    controller.update_position("music-widget", true, widget, Point::new(178.0, 90.0));
    controller.scan_for_attraction();
    println!("state: {:?}", controller.item_state("music-widget"));

    Ok(())
}
