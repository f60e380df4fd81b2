//! Chase Drive entry point
//!
//! Handles platform-specific initialization and runs the frame loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{HtmlCanvasElement, KeyboardEvent};

    use chase_drive::renderer::{MeshData, MeshKind, MeshLibrary, SceneRenderState};
    use chase_drive::sim::{FrameClock, Key, KeySet, Scene, SceneEvent, TickInput, tick};
    use chase_drive::{Settings, Tuning};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    /// Imported models that replace the procedural meshes when present
    const MESH_URLS: [(MeshKind, &str); 2] = [
        (MeshKind::Chassis, "assets/chassis.json"),
        (MeshKind::Wheel, "assets/wheel.json"),
    ];

    /// Game instance holding all state
    struct Game {
        scene: Scene,
        rng: Pcg32,
        clock: Option<FrameClock>,
        keys: KeySet,
        render_state: Option<SceneRenderState>,
        settings: Settings,
        // FPS tracking
        frame_times: [f64; 60],
        frame_index: usize,
        fps: u32,
    }

    impl Game {
        fn new(seed: u64, settings: Settings) -> Self {
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut scene = Scene::new(Tuning::default(), &mut rng);
            scene.camera.fov_y = settings.fov_radians();
            Self {
                scene,
                rng,
                clock: None,
                keys: KeySet::new(),
                render_state: None,
                settings,
                frame_times: [0.0; 60],
                frame_index: 0,
                fps: 0,
            }
        }

        /// Advance the scene to `time` (ms since page load)
        fn update(&mut self, time: f64) {
            let clock = self.clock.get_or_insert_with(|| FrameClock::new(time));
            let frame_time = clock.advance(time);

            let input = TickInput { keys: self.keys };
            let events = tick(&mut self.scene, &input, frame_time, &mut self.rng);
            for event in &events {
                if let SceneEvent::ControlLost = event {
                    log::info!("Off the road after {:.1}s", frame_time.t);
                }
            }

            // Track frame times for FPS
            self.frame_times[self.frame_index] = time;
            self.frame_index = (self.frame_index + 1) % 60;

            let oldest_time = self.frame_times[self.frame_index];
            if oldest_time > 0.0 {
                let elapsed = time - oldest_time;
                if elapsed > 0.0 {
                    self.fps = (60000.0 / elapsed).round() as u32;
                }
            }
        }

        /// Render the current frame
        fn render(&mut self, time: f64) {
            if let Some(ref mut render_state) = self.render_state {
                self.scene
                    .camera
                    .set_aspect_ratio(render_state.aspect_ratio());
                match render_state.render(&self.scene, &self.settings, (time / 1000.0) as f32) {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        render_state.reconfigure();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of memory!");
                    }
                    Err(e) => log::warn!("Render error: {:?}", e),
                }
            }
        }

        /// Update HUD elements in DOM
        fn update_hud(&self) {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };

            if let Some(el) = document.query_selector("#hud-hits .hud-value").ok().flatten() {
                el.set_text_content(Some(&self.scene.struck_count().to_string()));
            }

            if let Some(el) = document.get_element_by_id("hud-fps") {
                let class = if self.settings.show_fps {
                    "hud-item"
                } else {
                    "hud-item hidden"
                };
                let _ = el.set_attribute("class", class);
            }
            if let Some(el) = document.query_selector("#hud-fps .hud-value").ok().flatten() {
                el.set_text_content(Some(&self.fps.to_string()));
            }

            if let Some(el) = document.get_element_by_id("off-road") {
                let class = if self.scene.is_controllable {
                    "hidden"
                } else {
                    ""
                };
                let _ = el.set_attribute("class", class);
            }
        }
    }

    /// Fetch a JSON mesh; any failure leaves the procedural mesh in place
    async fn fetch_mesh(url: &str) -> Option<MeshData> {
        let text = match fetch_text(url).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Could not fetch {}: {:?}", url, e);
                return None;
            }
        };
        match MeshData::from_json_str(&text) {
            Ok(mesh) => Some(mesh),
            Err(e) => {
                log::warn!("Could not load {}: {}", url, e);
                None
            }
        }
    }

    async fn fetch_text(url: &str) -> Result<String, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let response: web_sys::Response = JsFuture::from(window.fetch_with_str(url))
            .await?
            .dyn_into()?;
        if !response.ok() {
            return Err(JsValue::from_str(&format!("HTTP {}", response.status())));
        }
        let text = JsFuture::from(response.text()?).await?;
        text.as_string()
            .ok_or_else(|| JsValue::from_str("response body is not text"))
    }

    pub async fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Chase Drive starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        // Hide loading indicator
        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .expect("no canvas")
            .dyn_into()
            .expect("not a canvas");

        let (width, height) = fit_canvas(&window, &canvas);

        let settings = Settings::load();
        let seed = js_sys::Date::now() as u64;
        let game = Rc::new(RefCell::new(Game::new(seed, settings.clone())));
        log::info!("Scene initialized with seed: {}", seed);

        // Initialize WebGPU
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
            .expect("Failed to create surface");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("Failed to get adapter");

        log::info!("Using adapter: {:?}", adapter.get_info().name);

        let mut library = MeshLibrary::procedural(settings.quality);
        for (kind, url) in MESH_URLS {
            if let Some(mesh) = fetch_mesh(url).await {
                log::info!(
                    "Loaded {:?} mesh from {} ({} triangles)",
                    kind,
                    url,
                    mesh.triangle_count()
                );
                library.set(kind, mesh);
            }
        }

        let render_state = SceneRenderState::new(surface, &adapter, width, height, &library)
            .await
            .expect("Failed to create renderer");
        game.borrow_mut().render_state = Some(render_state);

        setup_input_handlers(game.clone());
        setup_resize_handler(canvas, game.clone());

        if let Some(hud) = document.get_element_by_id("hud") {
            let _ = hud.set_attribute("class", "");
        }

        // Start frame loop
        request_animation_frame(game);

        log::info!("Chase Drive running!");
    }

    /// Size the canvas backing store to its CSS size times the pixel ratio
    fn fit_canvas(window: &web_sys::Window, canvas: &HtmlCanvasElement) -> (u32, u32) {
        let dpr = window.device_pixel_ratio();
        let width = ((canvas.client_width() as f64 * dpr) as u32).max(1);
        let height = ((canvas.client_height() as f64 * dpr) as u32).max(1);
        canvas.set_width(width);
        canvas.set_height(height);
        (width, height)
    }

    fn setup_input_handlers(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().expect("no window");

        // Arrow keys held / released
        for (event_name, pressed) in [("keydown", true), ("keyup", false)] {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let name = event.key();
                let Some(key) = Key::from_name(&name) else {
                    if pressed && !event.repeat() {
                        let mut g = game.borrow_mut();
                        if g.settings.apply_hotkey(&name) {
                            log::info!(
                                "Settings: quality {}, sparks {}, fps {}",
                                g.settings.quality.as_str(),
                                g.settings.sparks,
                                g.settings.show_fps
                            );
                            g.settings.save();
                        }
                    }
                    return;
                };
                event.prevent_default();
                let mut g = game.borrow_mut();
                if pressed {
                    g.keys.insert(key);
                } else {
                    g.keys.remove(key);
                }
            });
            let _ = window
                .add_event_listener_with_callback(event_name, closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Window blur: keyup never arrives, so drop everything held
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::FocusEvent| {
                game.borrow_mut().keys.clear();
                log::debug!("Keys released (window blur)");
            });
            let _ = window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_resize_handler(canvas: HtmlCanvasElement, game: Rc<RefCell<Game>>) {
        let window = web_sys::window().expect("no window");
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let Some(window) = web_sys::window() else {
                return;
            };
            let (width, height) = fit_canvas(&window, &canvas);
            if let Some(ref mut render_state) = game.borrow_mut().render_state {
                render_state.resize(width, height);
            }
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(game, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        {
            let mut g = game.borrow_mut();
            g.update(time);
            g.render(time);
            g.update_hud();
        }

        request_animation_frame(game);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    wasm_game::run().await;
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use chase_drive::consts::FRAME_DT;
    use chase_drive::sim::{FrameClock, Key, Scene, SceneEvent, TickInput, tick};
    use chase_drive::{Tuning, TuningError};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    /// (seconds, keys held) - ends by steering off the right-hand edge
    const SCRIPT: &[(f32, &[Key])] = &[
        (1.0, &[Key::Up]),
        (0.75, &[Key::Left, Key::Up]),
        (1.0, &[Key::Up]),
        (0.75, &[Key::Right, Key::Up]),
        (2.0, &[Key::Up]),
        (0.5, &[Key::Down]),
        (0.5, &[]),
        (0.75, &[Key::Left, Key::Up]),
        (4.0, &[Key::Up]),
        (2.0, &[]),
    ];

    const SEED: u64 = 0x5EED;

    #[derive(Default)]
    struct Summary {
        frames: usize,
        struck: usize,
        falling: usize,
        control_lost_at: Option<f32>,
    }

    pub fn run() -> Result<(), TuningError> {
        let tuning = match std::env::args().nth(1) {
            Some(path) => {
                log::info!("Loading tuning from {}", path);
                Tuning::from_path(&path)?
            }
            None => Tuning::default(),
        };

        let mut rng = Pcg32::seed_from_u64(SEED);
        let mut scene = Scene::new(tuning, &mut rng);

        let frame_ms = f64::from(FRAME_DT) * 1000.0;
        let mut now_ms = 0.0;
        let mut clock = FrameClock::new(now_ms);
        let mut summary = Summary::default();

        for &(seconds, keys) in SCRIPT {
            let input = TickInput::with_keys(keys.iter().copied());
            let frames = (seconds / FRAME_DT).round() as usize;
            for _ in 0..frames {
                now_ms += frame_ms;
                let time = clock.advance(now_ms);
                for event in tick(&mut scene, &input, time, &mut rng) {
                    match event {
                        SceneEvent::SphereStruck { id, direction, .. } => {
                            summary.struck += 1;
                            log::info!(
                                "t={:.2}s struck sphere {} toward ({:.2}, {:.2}, {:.2})",
                                time.t,
                                id.0,
                                direction.x,
                                direction.y,
                                direction.z
                            );
                        }
                        SceneEvent::SphereFalling { id } => {
                            summary.falling += 1;
                            log::info!("t={:.2}s sphere {} fell off the road", time.t, id.0);
                        }
                        SceneEvent::ControlLost => {
                            summary.control_lost_at.get_or_insert(time.t);
                        }
                    }
                }
                summary.frames += 1;
            }
        }

        let chassis = scene.chassis();
        log::info!(
            "Drove {} frames: {} spheres struck, {} fell, car at ({:.1}, {:.1}, {:.1})",
            summary.frames,
            summary.struck,
            summary.falling,
            chassis.position.x,
            chassis.position.y,
            chassis.position.z
        );
        match summary.control_lost_at {
            Some(t) => log::info!("Control lost at t={:.2}s", t),
            None => log::info!("Car stayed on the road"),
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Chase Drive (native, headless) starting...");
    log::info!("The interactive version runs in the browser - build for wasm32 and serve it");

    if let Err(e) = headless::run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}
