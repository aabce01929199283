mod test_welcome_assigns_identity;
