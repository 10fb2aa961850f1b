/// Terminal review of a captured world map
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self},
};
use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};
use worldscan_core::ReviewController;

pub mod demo;
pub mod renderer;

pub use demo::SimulatedSession;
pub use renderer::AsciiRenderer;

/// Vertical field of view of the review camera
const FOV_Y: f32 = std::f32::consts::FRAC_PI_4;

/// Main application struct for reviewing a scan in the terminal
pub struct TerminalApp {
    review: ReviewController,
    renderer: AsciiRenderer,
    running: bool,
    started: Instant,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    pub fn new(review: ReviewController) -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        let mut renderer = AsciiRenderer::new(width as usize, height as usize);
        renderer.set_background(review.background);

        Ok(Self {
            review,
            renderer,
            running: true,
            started: Instant::now(),
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        })
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30); // 30 FPS target

        while self.running {
            let frame_start = Instant::now();

            if event::poll(Duration::from_millis(0))? {
                self.handle_input()?;
            }

            self.update();
            self.render()?;

            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn handle_input(&mut self) -> io::Result<()> {
        match event::read()? {
            Event::Key(KeyEvent { code, .. }) => {
                match code {
                    KeyCode::Char('q') | KeyCode::Esc => self.running = false,
                    KeyCode::Char('w') | KeyCode::Up => self.review.orbit.rotate(0.0, 0.1),
                    KeyCode::Char('s') | KeyCode::Down => self.review.orbit.rotate(0.0, -0.1),
                    KeyCode::Char('a') | KeyCode::Left => self.review.orbit.rotate(-0.1, 0.0),
                    KeyCode::Char('d') | KeyCode::Right => self.review.orbit.rotate(0.1, 0.0),
                    KeyCode::Char('+') | KeyCode::Char('=') => self.review.orbit.zoom(0.9),
                    KeyCode::Char('-') => self.review.orbit.zoom(1.1),
                    KeyCode::Char('r') => self.review.create_scene(),
                    KeyCode::Char('c') => self.review.clear_scene(),
                    _ => {}
                }
            }
            Event::Resize(width, height) => {
                self.renderer = AsciiRenderer::new(width as usize, height as usize);
                self.renderer.set_background(self.review.background);
            }
            _ => {}
        }
        Ok(())
    }

    fn update(&mut self) {
        self.review.update(self.started.elapsed().as_secs_f64());
    }

    fn render(&mut self) -> io::Result<()> {
        let camera = self.renderer.camera(&self.review.orbit, FOV_Y);

        self.renderer.clear();
        self.renderer.render_scene(self.review.scene(), &camera);

        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;

        self.renderer.draw(&mut stdout)?;

        let census = self.review.world_map().census();
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "WorldScan Review | FPS: {:.1} | {} meshes {} probes | WASD=Orbit +/-=Zoom R=Rebuild C=Clear Q=Quit",
                self.fps, census.mesh, census.probe
            )),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}
