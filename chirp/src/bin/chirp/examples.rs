use crate::commands::{auth, feed, notifications, social};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "login",
            groups: auth::LOGIN_EXAMPLES,
        },
        CommandExample {
            name: "signup",
            groups: auth::SIGNUP_EXAMPLES,
        },
        CommandExample {
            name: "feed",
            groups: feed::FEED_EXAMPLES,
        },
        CommandExample {
            name: "post",
            groups: feed::POST_EXAMPLES,
        },
        CommandExample {
            name: "profile",
            groups: social::PROFILE_EXAMPLES,
        },
        CommandExample {
            name: "edit-profile",
            groups: social::EDIT_PROFILE_EXAMPLES,
        },
        CommandExample {
            name: "notifications",
            groups: notifications::NOTIFICATIONS_EXAMPLES,
        },
        CommandExample {
            name: "watch",
            groups: notifications::WATCH_EXAMPLES,
        },
    ]
}
