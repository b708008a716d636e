// Navigation transitions over the performers -> videos -> scenes hierarchy.

use crate::domain::state::{NavigationLevel, NavigationState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationCommand {
    Home,
    Back,
    ToPerformer(String),
    ToVideo(String),
    ToScene(String),
    // Action name outside the known set; applied as a no-op.
    Unsupported,
}

impl NavigationState {
    /// Applies one navigation step.
    ///
    /// Forward steps do not check the current level first, so a client may jump straight
    /// to `scenes`. Target ids are not checked against any catalog here.
    pub fn apply(&mut self, command: NavigationCommand) {
        match command {
            NavigationCommand::Home => *self = NavigationState::default(),
            NavigationCommand::Back => {
                self.breadcrumb.pop();
                match self.current_level {
                    NavigationLevel::Scenes => {
                        self.current_level = NavigationLevel::Videos;
                        self.scene_id = None;
                    }
                    NavigationLevel::Videos => {
                        self.current_level = NavigationLevel::Performers;
                        self.video_id = None;
                    }
                    NavigationLevel::Performers => {}
                }
            }
            NavigationCommand::ToPerformer(id) => {
                self.current_level = NavigationLevel::Videos;
                self.breadcrumb.push(format!("performer:{id}"));
                self.performer_id = Some(id);
            }
            NavigationCommand::ToVideo(id) => {
                self.current_level = NavigationLevel::Scenes;
                self.breadcrumb.push(format!("video:{id}"));
                self.video_id = Some(id);
            }
            NavigationCommand::ToScene(id) => {
                self.breadcrumb.push(format!("scene:{id}"));
                self.scene_id = Some(id);
            }
            NavigationCommand::Unsupported => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_scene() -> NavigationState {
        let mut nav = NavigationState::default();
        nav.apply(NavigationCommand::ToPerformer("1".to_string()));
        nav.apply(NavigationCommand::ToVideo("2".to_string()));
        nav.apply(NavigationCommand::ToScene("3".to_string()));
        nav
    }

    #[test]
    fn when_navigating_forward_then_breadcrumb_tracks_each_step() {
        let nav = at_scene();

        assert_eq!(nav.current_level, NavigationLevel::Scenes);
        assert_eq!(nav.performer_id.as_deref(), Some("1"));
        assert_eq!(nav.video_id.as_deref(), Some("2"));
        assert_eq!(nav.scene_id.as_deref(), Some("3"));
        assert_eq!(nav.breadcrumb, vec!["performer:1", "video:2", "scene:3"]);
    }

    #[test]
    fn when_going_back_from_scenes_then_scene_is_cleared_and_level_is_videos() {
        let mut nav = at_scene();

        nav.apply(NavigationCommand::Back);

        assert_eq!(nav.current_level, NavigationLevel::Videos);
        assert_eq!(nav.breadcrumb, vec!["performer:1", "video:2"]);
        assert!(nav.scene_id.is_none());
        assert_eq!(nav.video_id.as_deref(), Some("2"));
    }

    #[test]
    fn when_going_back_from_videos_then_video_is_cleared_and_level_is_performers() {
        let mut nav = NavigationState::default();
        nav.apply(NavigationCommand::ToPerformer("1".to_string()));
        nav.video_id = Some("9".to_string());

        nav.apply(NavigationCommand::Back);

        assert_eq!(nav.current_level, NavigationLevel::Performers);
        assert!(nav.breadcrumb.is_empty());
        assert!(nav.video_id.is_none());
    }

    #[test]
    fn when_going_back_at_root_then_nothing_changes() {
        let mut nav = NavigationState::default();

        nav.apply(NavigationCommand::Back);

        assert_eq!(nav, NavigationState::default());
    }

    #[test]
    fn when_navigating_home_then_state_is_reset_to_root() {
        let mut nav = at_scene();

        nav.apply(NavigationCommand::Home);

        assert_eq!(nav.current_level, NavigationLevel::Performers);
        assert!(nav.breadcrumb.is_empty());
        assert!(nav.performer_id.is_none());
        assert!(nav.video_id.is_none());
        assert!(nav.scene_id.is_none());
    }

    #[test]
    fn when_jumping_to_video_from_root_then_level_skips_to_scenes() {
        let mut nav = NavigationState::default();

        nav.apply(NavigationCommand::ToVideo("7".to_string()));

        assert_eq!(nav.current_level, NavigationLevel::Scenes);
        assert_eq!(nav.breadcrumb, vec!["video:7"]);
        assert!(nav.performer_id.is_none());
    }

    #[test]
    fn when_action_is_unsupported_then_state_is_unchanged() {
        let mut nav = at_scene();
        let before = nav.clone();

        nav.apply(NavigationCommand::Unsupported);

        assert_eq!(nav, before);
    }
}
