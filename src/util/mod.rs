pub mod html_form;
