//! HTML pages. Every piece of user-provided text goes through
//! [`html_escape`] before it is interpolated.

use crate::models::post::Post;

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn nav(authenticated: bool) -> &'static str {
    if authenticated {
        r#"<a href="/">Home</a> <a href="/dashboard">Dashboard</a> <a href="/posts/create">New post</a> <a href="/logout">Logout</a>"#
    } else {
        r#"<a href="/">Home</a> <a href="/login">Login</a> <a href="/register">Register</a>"#
    }
}

fn layout(title: &str, authenticated: bool, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 720px; margin: 0 auto; padding: 1rem; color: #222; }}
        nav a {{ margin-right: 1rem; }}
        .post-body {{ white-space: pre-wrap; }}
        .post img {{ max-width: 100%; }}
        .error {{ color: #a00; }}
        form.inline {{ display: inline; }}
        label {{ display: block; margin-top: 0.5rem; }}
    </style>
</head>
<body>
    <nav>{nav}</nav>
    <main>
{content}
    </main>
</body>
</html>"#,
        title = html_escape(title),
        nav = nav(authenticated),
        content = content,
    )
}

fn post_summary(post: &Post) -> String {
    format!(
        r#"<li><a href="/posts/{id}">{title}</a></li>"#,
        id = post.id,
        title = html_escape(&post.title),
    )
}

fn post_list(posts: &[Post]) -> String {
    if posts.is_empty() {
        return "<p>No posts yet.</p>".to_string();
    }
    let items: Vec<String> = posts.iter().map(post_summary).collect();
    format!("<ul class=\"posts\">\n{}\n</ul>", items.join("\n"))
}

fn image_tag(post: &Post) -> String {
    match &post.image_url {
        Some(url) => format!(
            r#"<img src="{url}" alt="{title}">"#,
            url = html_escape(url),
            title = html_escape(&post.title),
        ),
        None => String::new(),
    }
}

fn delete_button(post: &Post) -> String {
    format!(
        r#"<form class="inline" method="post" action="/posts/{id}/delete"><button type="submit">Delete</button></form>"#,
        id = post.id,
    )
}

/// `GET /`
pub fn home(posts: &[Post], authenticated: bool) -> String {
    let content = format!("<h1>Latest posts</h1>\n{}", post_list(posts));
    layout("Home", authenticated, &content)
}

/// `GET /register`
pub fn register_form(authenticated: bool) -> String {
    let content = r#"<h1>Register</h1>
<form method="post" action="/register">
    <label>Email <input type="email" name="email" required></label>
    <label>Password <input type="password" name="password" required></label>
    <button type="submit">Register</button>
</form>"#;
    layout("Register", authenticated, content)
}

/// `GET /login`
pub fn login_form(authenticated: bool) -> String {
    let content = r#"<h1>Login</h1>
<form method="post" action="/login">
    <label>Email <input type="email" name="email" required></label>
    <label>Password <input type="password" name="password" required></label>
    <button type="submit">Login</button>
</form>"#;
    layout("Login", authenticated, content)
}

/// `GET /dashboard`
pub fn dashboard(email: &str, posts: &[Post]) -> String {
    let rows: Vec<String> = posts
        .iter()
        .map(|post| {
            format!(
                r#"<li><a href="/posts/{id}">{title}</a> <a href="/posts/{id}/edit">Edit</a> {delete}</li>"#,
                id = post.id,
                title = html_escape(&post.title),
                delete = delete_button(post),
            )
        })
        .collect();

    let list = if rows.is_empty() {
        "<p>You have not written any posts yet.</p>".to_string()
    } else {
        format!("<ul class=\"posts\">\n{}\n</ul>", rows.join("\n"))
    };

    let content = format!(
        "<h1>Dashboard</h1>\n<p>Logged in as {email}</p>\n<p><a href=\"/posts/create\">Write a post</a></p>\n{list}",
        email = html_escape(email),
        list = list,
    );
    layout("Dashboard", true, &content)
}

/// `GET /posts/create`
pub fn create_post_form() -> String {
    let content = r#"<h1>New post</h1>
<form method="post" action="/posts" enctype="multipart/form-data">
    <label>Title <input type="text" name="title" required></label>
    <label>Body <textarea name="body" rows="10"></textarea></label>
    <label>Image <input type="file" name="image" accept="image/*"></label>
    <button type="submit">Publish</button>
</form>"#;
    layout("New post", true, content)
}

/// `GET /posts/{id}`
pub fn show_post(post: &Post, authenticated: bool, is_owner: bool) -> String {
    let actions = if is_owner {
        format!(
            r#"<p><a href="/posts/{id}/edit">Edit</a> {delete}</p>"#,
            id = post.id,
            delete = delete_button(post),
        )
    } else {
        String::new()
    };

    let content = format!(
        r#"<article class="post">
<h1>{title}</h1>
{image}
<div class="post-body">{body}</div>
</article>
{actions}"#,
        title = html_escape(&post.title),
        image = image_tag(post),
        body = html_escape(&post.body),
        actions = actions,
    );
    layout(&post.title, authenticated, &content)
}

/// `GET /posts/{id}/edit`
pub fn edit_post_form(post: &Post) -> String {
    let current_image = match &post.image_url {
        Some(_) => format!("<p>Current image:</p>\n{}", image_tag(post)),
        None => String::new(),
    };

    let content = format!(
        r#"<h1>Edit post</h1>
<form method="post" action="/posts/{id}/edit" enctype="multipart/form-data">
    <label>Title <input type="text" name="title" value="{title}" required></label>
    <label>Body <textarea name="body" rows="10">{body}</textarea></label>
    {current_image}
    <label>Replace image <input type="file" name="image" accept="image/*"></label>
    <button type="submit">Save</button>
</form>"#,
        id = post.id,
        title = html_escape(&post.title),
        body = html_escape(&post.body),
        current_image = current_image,
    );
    layout("Edit post", true, &content)
}

/// The message page every handler error ends up as.
pub fn error_page(message: &str, authenticated: bool) -> String {
    let content = format!(
        "<h1>Error</h1>\n<p class=\"error\">{}</p>",
        html_escape(message)
    );
    layout("Error", authenticated, &content)
}
